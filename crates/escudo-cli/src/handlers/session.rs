//! Session command handler
//!
//! Runs a full in-process session: background router, page agent, and a
//! scripted popup driving them both. The script mirrors a user opening the
//! popup, scanning, optionally applying protection, and optionally
//! confirming training mode to run one demonstration.

use crate::config::{load_runtime_config, CliConfig};
use crate::error::{CliError, CliResult};
use crate::output::{render_json, OutputFormat, Reporter};
use crate::snapshot;
use crate::SessionArgs;
use escudo::message::Response;
use escudo::page::PageWorld;
use escudo::persist::{JsonFileStore, MemoryStore, StateStore};
use escudo::popup::{PopupController, PopupView};
use escudo::runtime::{RuntimeConfig, SessionRuntime};
use serde_json::json;

/// Execute the session command
///
/// # Errors
///
/// Returns an error if the snapshot or settings cannot be loaded, the
/// session contexts cannot be reached, or a requested demonstration is
/// refused.
pub fn execute_session(config: &CliConfig, args: &SessionArgs) -> CliResult<()> {
    let runtime_config = load_runtime_config(args.config.as_deref())?;
    let world = snapshot::resolve_world(args.snapshot.as_deref(), args.sample)?;
    let url = world.url.clone();

    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.header(&format!("Session: {url}"));

    let view = match &args.state {
        Some(path) => run_session(&reporter, args, runtime_config, JsonFileStore::new(path), world),
        None => run_session(&reporter, args, runtime_config, MemoryStore::default(), world),
    }?;

    match OutputFormat::from(args.format) {
        OutputFormat::Json => print_json(&url, &view)?,
        OutputFormat::Text => print_view(&reporter, &view),
    }
    if let Some(path) = &args.state {
        reporter.info(&format!("State persisted to {}", path.display()));
    }
    Ok(())
}

/// Drives the scripted popup against a freshly started session and returns
/// the final view of its surface.
fn run_session<S>(
    reporter: &Reporter,
    args: &SessionArgs,
    runtime_config: RuntimeConfig,
    store: S,
    world: PageWorld,
) -> CliResult<PopupView>
where
    S: StateStore + Send + 'static,
{
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let session = SessionRuntime::start(runtime_config, store, world);
        let mut controller =
            PopupController::new(session.router().clone(), session.page().clone());

        let view = controller.scan().await?;
        reporter.info(&view.status_text);

        if args.protect {
            let view = controller.apply_protection().await?;
            reporter.success(&format!(
                "Protection {}, page rescanned",
                view.protection_label
            ));
        }

        if let Some(attack) = &args.demo {
            let token = controller.request_training();
            controller.confirm_training(token).await?;
            reporter.info("Training mode confirmed");
            let response = controller.demonstrate(attack).await?;
            if let Response::Failure { error, .. } = &response {
                let message = error.clone();
                controller.deactivate_training().await?;
                session.shutdown();
                return Err(CliError::command(message));
            }
            reporter.success(&format!("Demonstration running: {attack}"));
        }

        // Capture the surface while any training state is still visible,
        // then leave training so the persisted state ends in defense.
        let view = controller.refresh().await?;
        if args.demo.is_some() {
            controller.deactivate_training().await?;
        }
        session.shutdown();
        Ok(view)
    })
}

fn print_view(reporter: &Reporter, view: &PopupView) {
    reporter.header("Popup");
    println!("{:<12}{}", "Status:", view.status_text);
    match &view.react_version {
        Some(version) => println!("{:<12}React {version}", "React:"),
        None => println!("{:<12}not detected", "React:"),
    }
    println!("{:<12}{}", "Protection:", view.protection_label);
    if view.badge_text.is_empty() {
        println!("{:<12}(clear)", "Badge:");
    } else {
        println!("{:<12}{}", "Badge:", view.badge_text);
    }
    println!("{:<12}{}", "Mode:", view.mode_label);
    if !view.findings.is_empty() {
        println!();
        for finding in &view.findings {
            println!(
                "  {} {}",
                reporter.severity_badge(finding.severity),
                finding.description
            );
        }
    }
    if !view.log_lines.is_empty() {
        println!();
        println!("Activity log:");
        for line in &view.log_lines {
            println!("  {line}");
        }
    }
}

fn print_json(url: &str, view: &PopupView) -> CliResult<()> {
    let findings: Vec<_> = view
        .findings
        .iter()
        .map(|finding| {
            json!({
                "severity": finding.severity.to_string(),
                "kind": finding.kind.to_string(),
                "description": finding.description,
            })
        })
        .collect();
    let payload = json!({
        "url": url,
        "statusText": view.status_text,
        "reactVersion": view.react_version,
        "protectionLabel": view.protection_label,
        "badgeText": view.badge_text,
        "mode": view.mode_label,
        "trainingActive": view.training_checked,
        "autoDemoVisible": view.auto_demo_visible,
        "findings": findings,
        "logLines": view.log_lines,
    });
    println!("{}", render_json(&payload)?);
    Ok(())
}
