//! Scan command handler

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{render_json, OutputFormat, Reporter};
use crate::snapshot;
use crate::ScanArgs;
use escudo::page::PageWorld;
use escudo::state::{Severity, Vulnerability};
use serde_json::json;

/// One scanned page: where it came from and what the scanner found.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Input label (file path or `sample`)
    pub source: String,
    /// Page URL
    pub url: String,
    /// Resolved React version, when React is present
    pub react_version: Option<String>,
    /// Scanner findings, in check order
    pub findings: Vec<Vulnerability>,
}

/// Scan every input and collect outcomes in input order.
pub fn run_scans(args: &ScanArgs) -> CliResult<Vec<ScanOutcome>> {
    let mut outcomes = Vec::new();
    if args.sample {
        outcomes.push(scan_world("sample".to_string(), snapshot::sample_world()));
    }
    if !args.snapshots.is_empty() {
        for path in snapshot::expand_patterns(&args.snapshots)? {
            let world = snapshot::load_world(&path)?;
            outcomes.push(scan_world(path.display().to_string(), world));
        }
    }
    if outcomes.is_empty() {
        return Err(CliError::invalid_argument(
            "provide snapshot files or pass --sample",
        ));
    }
    Ok(outcomes)
}

fn scan_world(source: String, world: PageWorld) -> ScanOutcome {
    let react_version = escudo::detect::detect(&world).map(|detection| detection.version);
    let findings = escudo::scanner::scan(&world);
    ScanOutcome {
        source,
        url: world.url,
        react_version,
        findings,
    }
}

/// Count findings at or above a severity threshold, across all outcomes.
#[must_use]
pub fn count_at_or_above(outcomes: &[ScanOutcome], threshold: Severity) -> usize {
    outcomes
        .iter()
        .flat_map(|outcome| &outcome.findings)
        .filter(|finding| finding.severity >= threshold)
        .count()
}

/// Execute the scan command
pub fn execute_scan(config: &CliConfig, args: &ScanArgs) -> CliResult<()> {
    let outcomes = run_scans(args)?;

    match OutputFormat::from(args.format) {
        OutputFormat::Json => print_json(&outcomes)?,
        OutputFormat::Text => print_text(config, args, &outcomes),
    }

    if let Some(threshold) = args.fail_on {
        let threshold = Severity::from(threshold);
        let hits = count_at_or_above(&outcomes, threshold);
        if hits > 0 {
            return Err(CliError::scan_gate(format!(
                "{hits} findings at or above {threshold}"
            )));
        }
    }
    Ok(())
}

fn print_json(outcomes: &[ScanOutcome]) -> CliResult<()> {
    let value: Vec<_> = outcomes
        .iter()
        .map(|outcome| {
            json!({
                "source": outcome.source,
                "url": outcome.url,
                "reactVersion": outcome.react_version,
                "findings": outcome.findings,
            })
        })
        .collect();
    println!("{}", render_json(&value)?);
    Ok(())
}

fn print_text(config: &CliConfig, args: &ScanArgs, outcomes: &[ScanOutcome]) {
    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let detail = args.detail || config.verbosity.is_verbose();
    for outcome in outcomes {
        reporter.header(&format!("Scan: {}", outcome.url));
        match &outcome.react_version {
            Some(version) => reporter.info(&format!("React {version} detected")),
            None => reporter.info("React not detected, checks skipped"),
        }
        for finding in &outcome.findings {
            reporter.finding(finding, detail);
        }
        reporter.scan_summary(&outcome.findings);
    }
}
