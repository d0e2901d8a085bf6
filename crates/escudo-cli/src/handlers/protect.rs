//! Protect command handler

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{render_json, OutputFormat, Reporter};
use crate::snapshot;
use crate::ProtectArgs;
use escudo::agent::PageAgent;
use escudo::message::{PageCommand, PageReply};
use escudo::state::Vulnerability;
use serde_json::json;
use std::collections::HashSet;

/// Execute the protect command
pub fn execute_protect(config: &CliConfig, args: &ProtectArgs) -> CliResult<()> {
    let world = snapshot::resolve_world(args.snapshot.as_deref(), args.sample)?;
    let url = world.url.clone();
    let before = escudo::scanner::scan(&world);

    let mut agent = PageAgent::new(world);
    let reply = agent.handle(PageCommand::ApplyProtection);
    if !matches!(reply, PageReply::Protection { protected: true, .. }) {
        return Err(CliError::command(
            "no React globals on this page, nothing to protect",
        ));
    }
    let after = escudo::scanner::scan(agent.world());

    match OutputFormat::from(args.format) {
        OutputFormat::Json => print_json(&url, &before, &after)?,
        OutputFormat::Text => print_text(config, &url, &before, &after),
    }

    if let Some(path) = &args.output {
        snapshot::write_world(path, agent.world())?;
        let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
        reporter.info(&format!("Hardened snapshot written to {}", path.display()));
    }
    Ok(())
}

/// Findings present before the guard and gone after it, compared by class.
#[must_use]
pub fn resolved_findings<'a>(
    before: &'a [Vulnerability],
    after: &[Vulnerability],
) -> Vec<&'a Vulnerability> {
    let remaining: HashSet<_> = after.iter().map(|finding| finding.kind).collect();
    before
        .iter()
        .filter(|finding| !remaining.contains(&finding.kind))
        .collect()
}

fn print_json(url: &str, before: &[Vulnerability], after: &[Vulnerability]) -> CliResult<()> {
    let resolved: Vec<_> = resolved_findings(before, after)
        .iter()
        .map(|finding| finding.kind)
        .collect();
    let value = json!({
        "url": url,
        "protected": true,
        "before": before,
        "after": after,
        "resolvedKinds": resolved,
    });
    println!("{}", render_json(&value)?);
    Ok(())
}

fn print_text(config: &CliConfig, url: &str, before: &[Vulnerability], after: &[Vulnerability]) {
    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.header(&format!("Protection: {url}"));
    reporter.info(&format!("{} findings before the guard", before.len()));
    reporter.success("Guard applied: internals trapped, render entry points wrapped");

    let resolved = resolved_findings(before, after);
    if !resolved.is_empty() {
        reporter.info(&format!("Resolved ({}):", resolved.len()));
        for finding in resolved {
            reporter.finding(finding, false);
        }
    }
    if !after.is_empty() {
        reporter.warning(&format!(
            "Remaining ({}), not addressable at runtime:",
            after.len()
        ));
        for finding in after {
            reporter.finding(finding, false);
        }
    }
    reporter.scan_summary(after);
}
