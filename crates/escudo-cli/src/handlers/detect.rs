//! Detect command handler

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::{render_json, OutputFormat, Reporter};
use crate::snapshot;
use crate::DetectArgs;
use escudo::detect::DetectionReport;
use escudo::page::ComponentMarker;
use escudo::EscudoError;

/// Execute the detect command
pub fn execute_detect(config: &CliConfig, args: &DetectArgs) -> CliResult<()> {
    let world = snapshot::resolve_world(args.snapshot.as_deref(), args.sample)?;
    let Some(report) = escudo::detect::report(&world) else {
        return Err(EscudoError::ReactNotDetected.into());
    };

    match OutputFormat::from(args.format) {
        OutputFormat::Json => println!("{}", render_json(&report)?),
        OutputFormat::Text => print_report(config, &world.url, &report),
    }
    Ok(())
}

/// CSS-selector style label for a component marker.
#[must_use]
pub fn marker_label(marker: &ComponentMarker) -> String {
    if let Some(id) = &marker.id {
        return format!("{}#{id}", marker.tag);
    }
    if let Some(class_name) = &marker.class_name {
        return format!("{}.{class_name}", marker.tag);
    }
    marker.tag.clone()
}

fn print_report(config: &CliConfig, url: &str, report: &DetectionReport) {
    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.header(&format!("Detection: {url}"));
    reporter.success(&format!("React {} detected", report.version));

    let build = if report.dev_mode {
        "development (internals reachable)"
    } else {
        "production"
    };
    println!("Build:        {build}");
    println!(
        "Hooks API:    {}",
        if report.hooks_available {
            "available"
        } else {
            "not available"
        }
    );
    for hook in &report.hooks {
        println!("  {:<20} {}", hook.name, hook.description);
    }
    println!(
        "React Router: {}",
        if report.using_react_router { "yes" } else { "no" }
    );
    println!(
        "Redux:        {}",
        if report.using_redux { "yes" } else { "no" }
    );
    println!("Components:   {} found", report.component_count);
    for marker in &report.component_sample {
        println!("  {}", marker_label(marker));
    }
}
