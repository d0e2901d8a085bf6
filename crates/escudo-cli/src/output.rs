//! Output formatting and progress reporting

use console::{style, Style, Term};
use escudo::logbook::LogEntry;
use escudo::state::{Severity, Vulnerability};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Render a value as pretty-printed JSON for `--format json` output
pub fn render_json<T: Serialize>(value: &T) -> crate::error::CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| crate::error::CliError::command(format!("JSON render failed: {e}")))
}

/// Progress and finding reporter for command execution
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over a fixed number of steps
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message("Done");
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Severity badge, colored when enabled
    #[must_use]
    pub fn severity_badge(&self, severity: Severity) -> String {
        let badge = format!("[{severity}]");
        if !self.use_color {
            return badge;
        }
        let styled = match severity {
            Severity::Low => Style::new().cyan(),
            Severity::Medium => Style::new().yellow(),
            Severity::High => Style::new().red(),
            Severity::Critical => Style::new().red().bold(),
        };
        styled.apply_to(badge).to_string()
    }

    /// Print one scanner finding. `detail` adds the class and risk
    /// explanation below the summary line. Quiet mode drops the listing
    /// and keeps only the scan summary tally.
    pub fn finding(&self, vulnerability: &Vulnerability, detail: bool) {
        if self.quiet {
            return;
        }

        let badge = self.severity_badge(vulnerability.severity);
        let _ = self
            .term
            .write_line(&format!("  {badge} {}", vulnerability.description));
        let location = if self.use_color {
            style(&vulnerability.location).dim().to_string()
        } else {
            vulnerability.location.clone()
        };
        let _ = self.term.write_line(&format!("      at {location}"));
        if detail {
            let _ = self
                .term
                .write_line(&format!("      class: {}", vulnerability.kind));
            let _ = self
                .term
                .write_line(&format!("      risk: {}", vulnerability.details));
        }
    }

    /// Print the severity tally for a scan
    pub fn scan_summary(&self, findings: &[Vulnerability]) {
        if findings.is_empty() {
            self.success("No vulnerabilities detected");
            return;
        }

        let tally = [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ]
        .iter()
        .filter_map(|&severity| {
            let count = findings
                .iter()
                .filter(|finding| finding.severity == severity)
                .count();
            (count > 0).then(|| format!("{count} {severity}"))
        })
        .collect::<Vec<_>>()
        .join(", ");

        let noun = if findings.len() == 1 {
            "finding"
        } else {
            "findings"
        };
        self.failure(&format!("{} {noun} ({tally})", findings.len()));
    }

    /// Print one activity log entry, styled by its level
    pub fn log_line(&self, entry: &LogEntry) {
        let line = entry.format_line();
        let rendered = if self.use_color {
            match entry.level() {
                escudo::logbook::LogLevel::Error => style(line).red().to_string(),
                escudo::logbook::LogLevel::Warn => style(line).yellow().to_string(),
                escudo::logbook::LogLevel::Debug => style(line).dim().to_string(),
                _ => line,
            }
        } else {
            line
        };
        let _ = self.term.write_line(&rendered);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use escudo::state::VulnKind;

    fn sample_finding(severity: Severity) -> Vulnerability {
        Vulnerability::new(
            VulnKind::DangerousInnerhtml,
            severity,
            "Component uses dangerouslySetInnerHTML",
            "<div>",
            "Unsanitized HTML injection can lead to XSS attacks",
        )
    }

    mod output_format_tests {
        use super::*;

        #[test]
        fn test_default_format() {
            let format = OutputFormat::default();
            assert_eq!(format, OutputFormat::Text);
        }

        #[test]
        fn test_format_variants() {
            let _ = OutputFormat::Text;
            let _ = OutputFormat::Json;
        }
    }

    mod reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = Reporter::new(true, false);
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_default_reporter() {
            let reporter = Reporter::default();
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_message_helpers() {
            let reporter = Reporter::new(false, false);
            reporter.success("scan clean");
            reporter.failure("scan found issues");
            reporter.warning("protection not applied");
            reporter.info("React 18.2.0");
            reporter.header("Findings");
            // No panic = success
        }

        #[test]
        fn test_severity_badge_plain() {
            let reporter = Reporter::new(false, false);
            assert_eq!(reporter.severity_badge(Severity::High), "[HIGH]");
            assert_eq!(reporter.severity_badge(Severity::Critical), "[CRITICAL]");
        }

        #[test]
        fn test_severity_badge_colored_keeps_label() {
            let reporter = Reporter::new(true, false);
            assert!(reporter.severity_badge(Severity::Medium).contains("MEDIUM"));
        }

        #[test]
        fn test_finding_output() {
            let reporter = Reporter::new(false, false);
            reporter.finding(&sample_finding(Severity::High), false);
            reporter.finding(&sample_finding(Severity::Critical), true);
            // No panic = success
        }

        #[test]
        fn test_scan_summary_empty_and_full() {
            let reporter = Reporter::new(false, false);
            reporter.scan_summary(&[]);
            reporter.scan_summary(&[
                sample_finding(Severity::High),
                sample_finding(Severity::High),
                sample_finding(Severity::Low),
            ]);
            // No panic = success
        }

        #[test]
        fn test_log_line_output() {
            let reporter = Reporter::new(false, false);
            let entry = LogEntry::new("scan", "completed", serde_json::Map::new());
            reporter.log_line(&entry);

            let colored = Reporter::new(true, false);
            let warn = LogEntry::new("security", "attackAttempt", serde_json::Map::new());
            colored.log_line(&warn);
            // No panic = success
        }

        #[test]
        fn test_progress_bar() {
            let mut reporter = Reporter::new(false, false);
            reporter.start_progress(4, "Running demonstrations");
            reporter.increment(1);
            reporter.set_message("cookieAccess");
            reporter.increment(1);
            reporter.finish();
            // No panic = success
        }

        #[test]
        fn test_quiet_mode_suppresses_output() {
            let mut reporter = Reporter::new(false, true);
            reporter.start_progress(4, "Running demonstrations");
            reporter.success("hidden");
            reporter.warning("hidden");
            reporter.info("hidden");
            reporter.header("hidden");
            // Failure is still printed
            reporter.failure("shown");
            // No panic = success
        }
    }
}
