//! Demo command handler
//!
//! Rehearses attack demonstrations against a snapshot. The single form runs
//! one demonstration synchronously on the world's virtual clock; `--auto`
//! starts a live session and lets its cycle driver walk the full sequence.

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{render_json, OutputFormat, Reporter};
use crate::snapshot;
use crate::DemoArgs;
use escudo::demo::{
    DemoKind, DemoRecord, DemoSchedule, DemoSession, AUTO_SEQUENCE, BEACON_CONTAINER_ID,
    DEMO_CONTAINER_ID, EXFIL_CONTAINER_ID, HOOK_INDICATOR_ID, INJECTION_ID,
};
use escudo::message::PageCommand;
use escudo::page::{PageElement, PageWorld};
use escudo::persist::MemoryStore;
use escudo::runtime::{RuntimeConfig, SessionRuntime};
use escudo::state::Mode;
use serde_json::json;
use std::time::{Duration, Instant};

/// Overlay ids every demonstration teardown must remove. The training
/// banner is not listed; it tracks training mode, not the demonstration.
const OVERLAY_IDS: [&str; 5] = [
    DEMO_CONTAINER_ID,
    INJECTION_ID,
    HOOK_INDICATOR_ID,
    EXFIL_CONTAINER_ID,
    BEACON_CONTAINER_ID,
];

/// How often the cycle watcher polls the page for the active demonstration.
const CYCLE_POLL_MS: u64 = 25;

/// Execute the demo command
pub fn execute_demo(config: &CliConfig, args: &DemoArgs) -> CliResult<()> {
    let world = snapshot::resolve_world(args.snapshot.as_deref(), args.sample)?;
    if args.auto {
        return run_auto_cycle(config, args, world);
    }
    let Some(attack) = args.attack.as_deref() else {
        return Err(CliError::invalid_argument(
            "name an attack type or pass --auto",
        ));
    };
    let kind: DemoKind = attack.parse()?;
    run_single(config, args, kind, world)
}

/// Demonstration pacing from the command line flags.
#[must_use]
pub const fn schedule_from_args(args: &DemoArgs) -> DemoSchedule {
    DemoSchedule {
        settle_ms: args.settle_ms,
        observe_ms: args.observe_ms,
        between_ms: args.between_ms,
        hook_interval_ms: args.hook_interval_ms,
    }
}

/// Text lines of an overlay element, depth first, element text before
/// children.
#[must_use]
pub fn overlay_lines(element: &PageElement) -> Vec<String> {
    let mut lines = Vec::new();
    collect_text(element, &mut lines);
    lines
}

fn collect_text(element: &PageElement, lines: &mut Vec<String>) {
    if let Some(text) = &element.text {
        if !text.is_empty() {
            lines.push(text.clone());
        }
    }
    for child in &element.children {
        collect_text(child, lines);
    }
}

/// Ids of demonstration elements still present in the world.
#[must_use]
pub fn teardown_residue(world: &PageWorld) -> Vec<&'static str> {
    OVERLAY_IDS
        .iter()
        .copied()
        .filter(|id| world.element(id).is_some())
        .collect()
}

fn history_line(record: &DemoRecord) -> String {
    let clock = chrono::DateTime::from_timestamp_millis(record.timestamp as i64)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    format!("[{clock}] {} (React {})", record.kind, record.react_version)
}

fn verify_teardown(world: &PageWorld) -> CliResult<()> {
    let residue = teardown_residue(world);
    if !residue.is_empty() {
        return Err(CliError::command(format!(
            "demonstration teardown left elements behind: {}",
            residue.join(", ")
        )));
    }
    if world.timer_count() > 0 {
        return Err(CliError::command(
            "demonstration teardown left timers behind",
        ));
    }
    Ok(())
}

fn run_single(
    config: &CliConfig,
    args: &DemoArgs,
    kind: DemoKind,
    mut world: PageWorld,
) -> CliResult<()> {
    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let schedule = schedule_from_args(args);
    let mut session = DemoSession::default();
    session.start(&mut world, kind, &schedule, true)?;

    let hook_ticks = (kind == DemoKind::PersistentHook && args.ticks > 0).then(|| {
        world.advance_millis(args.ticks * schedule.hook_interval_ms);
        args.ticks
    });

    let overlay: Vec<String> = OVERLAY_IDS
        .iter()
        .filter_map(|id| world.element(id))
        .flat_map(overlay_lines)
        .collect();
    let url = world.url.clone();

    session.stop(&mut world);
    verify_teardown(&world)?;

    match OutputFormat::from(args.format) {
        OutputFormat::Json => {
            let value = json!({
                "url": url,
                "attackType": kind,
                "overlay": overlay,
                "hookTicks": hook_ticks,
                "history": session.history(),
                "cleanupVerified": true,
            });
            println!("{}", render_json(&value)?);
        }
        OutputFormat::Text => {
            reporter.header(&format!("Demonstration: {kind}"));
            for line in &overlay {
                for part in line.split('\n') {
                    println!("  {part}");
                }
            }
            if let Some(ticks) = hook_ticks {
                reporter.info(&format!(
                    "Virtual clock advanced {} ms, hook fired {ticks} times",
                    ticks * schedule.hook_interval_ms
                ));
            }
            for record in session.history() {
                reporter.info(&history_line(record));
            }
            reporter.success("Cleanup verified: no demonstration elements or timers remain");
        }
    }
    Ok(())
}

fn run_auto_cycle(config: &CliConfig, args: &DemoArgs, world: PageWorld) -> CliResult<()> {
    let mut reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let text = OutputFormat::from(args.format) == OutputFormat::Text;
    let schedule = schedule_from_args(args);
    let runtime_config = RuntimeConfig {
        schedule,
        ..RuntimeConfig::default()
    };
    let url = world.url.clone();

    // The cycle runs one demonstration per observe window plus the pauses
    // around it; anything past the deadline means a demonstration was
    // refused and skipped.
    let sequence_len = AUTO_SEQUENCE.len() as u64;
    let deadline_ms = schedule.settle_ms
        + sequence_len * (schedule.observe_ms + schedule.between_ms)
        + schedule.observe_ms;

    let runtime = tokio::runtime::Runtime::new()?;
    let observed = runtime.block_on(async {
        let session = SessionRuntime::start(runtime_config, MemoryStore::default(), world);
        session
            .page()
            .send(PageCommand::SetMode {
                mode: Mode::Training,
            })
            .await?;
        session
            .page()
            .send(PageCommand::SetAutoDemo { auto_demo: true })
            .await?;

        if text {
            reporter.start_progress(sequence_len, "Demonstration cycle");
        }
        let mut observed: Vec<DemoKind> = Vec::new();
        let started = Instant::now();
        while started.elapsed() < Duration::from_millis(deadline_ms) {
            tokio::time::sleep(Duration::from_millis(CYCLE_POLL_MS)).await;
            let Some(active) = session.page().active_demonstration().await? else {
                continue;
            };
            if observed.last() != Some(&active) {
                observed.push(active);
                if text {
                    reporter.set_message(active.wire_name());
                    reporter.increment(1);
                }
            }
            if observed.len() == AUTO_SEQUENCE.len() {
                break;
            }
        }
        if text {
            reporter.finish();
        }

        // Leaving training mode stops the cycle and tears everything down
        session
            .page()
            .send(PageCommand::SetMode {
                mode: Mode::Defense,
            })
            .await?;
        let world = session.page().snapshot().await?;
        session.shutdown();
        verify_teardown(&world)?;
        Ok::<Vec<DemoKind>, CliError>(observed)
    })?;

    let complete = observed.len() == AUTO_SEQUENCE.len();
    if text {
        let names: Vec<&str> = observed.iter().map(|kind| kind.wire_name()).collect();
        if complete {
            reporter.success(&format!("Cycle complete: {}", names.join(", ")));
        } else {
            reporter.warning(&format!(
                "Cycle ended early, observed: {}",
                names.join(", ")
            ));
        }
        reporter.success("Cleanup verified: no demonstration elements or timers remain");
    } else {
        let value = json!({
            "url": url,
            "cycle": observed,
            "completed": complete,
            "cleanupVerified": true,
        });
        println!("{}", render_json(&value)?);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::FormatArg;

    fn sample_args(attack: &str) -> DemoArgs {
        DemoArgs {
            attack: Some(attack.to_string()),
            auto: false,
            snapshot: None,
            sample: true,
            observe_ms: 40,
            between_ms: 1,
            settle_ms: 1,
            hook_interval_ms: 20,
            ticks: 3,
            format: FormatArg::Text,
        }
    }

    #[test]
    fn test_schedule_from_args() {
        let schedule = schedule_from_args(&sample_args("cookieAccess"));
        assert_eq!(schedule.observe_ms, 40);
        assert_eq!(schedule.between_ms, 1);
        assert_eq!(schedule.settle_ms, 1);
        assert_eq!(schedule.hook_interval_ms, 20);
    }

    #[test]
    fn test_overlay_lines_order() {
        let element = PageElement::new("div")
            .with_text("own text")
            .with_child(PageElement::new("h2").with_text("heading"))
            .with_child(
                PageElement::new("ul")
                    .with_child(PageElement::new("li").with_text("first"))
                    .with_child(PageElement::new("li").with_text("second")),
            );
        assert_eq!(
            overlay_lines(&element),
            vec!["own text", "heading", "first", "second"]
        );
    }

    #[test]
    fn test_teardown_residue_flags_overlays() {
        let mut world = PageWorld::new("https://a/");
        assert!(teardown_residue(&world).is_empty());
        world.insert_element(PageElement::new("div").with_id(DEMO_CONTAINER_ID));
        world.insert_element(PageElement::new("div").with_id(HOOK_INDICATOR_ID));
        assert_eq!(
            teardown_residue(&world),
            vec![DEMO_CONTAINER_ID, HOOK_INDICATOR_ID]
        );
    }

    #[test]
    fn test_history_line_shape() {
        let record = DemoRecord {
            timestamp: 1_700_000_000_000,
            kind: DemoKind::CookieAccess,
            react_version: "18.2.0".to_string(),
        };
        let line = history_line(&record);
        assert!(line.contains("cookieAccess"));
        assert!(line.contains("React 18.2.0"));
    }

    #[test]
    fn test_execute_demo_each_kind() {
        let config = CliConfig::default();
        for attack in [
            "reactInternals",
            "domManipulation",
            "cookieAccess",
            "persistentHook",
            "exfiltration",
        ] {
            let result = execute_demo(&config, &sample_args(attack));
            assert!(result.is_ok(), "{attack} failed: {result:?}");
        }
    }

    #[test]
    fn test_execute_demo_json() {
        let config = CliConfig::default();
        let mut args = sample_args("exfiltration");
        args.format = FormatArg::Json;
        assert!(execute_demo(&config, &args).is_ok());
    }

    #[test]
    fn test_execute_demo_unknown_kind_fails() {
        let config = CliConfig::default();
        let err = execute_demo(&config, &sample_args("keylogger")).unwrap_err();
        assert!(err.to_string().contains("keylogger"));
    }

    #[test]
    fn test_execute_demo_react_demo_needs_react() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.json");
        std::fs::write(&path, r#"{"url": "https://plain.example/"}"#).unwrap();

        let config = CliConfig::default();
        let mut args = sample_args("reactInternals");
        args.sample = false;
        args.snapshot = Some(path);
        let err = execute_demo(&config, &args).unwrap_err();
        assert!(err.to_string().contains("React not detected"));
    }

    #[test]
    fn test_execute_demo_auto_cycle() {
        let config = CliConfig::default();
        let mut args = sample_args("cookieAccess");
        args.attack = None;
        args.auto = true;
        assert!(execute_demo(&config, &args).is_ok());
    }
}
