//! Logs command handler
//!
//! Inspects the activity log inside a state file written by
//! `session --state`, with category and level filters.

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{render_json, OutputFormat, Reporter};
use crate::LogsArgs;
use escudo::logbook::{LogBook, LogEntry, LogLevel};
use escudo::persist::{JsonFileStore, PersistedState, StateStore};

/// Execute the logs command
///
/// # Errors
///
/// Returns an error if the state file is missing or cannot be parsed.
pub fn execute_logs(config: &CliConfig, args: &LogsArgs) -> CliResult<()> {
    let mut store = JsonFileStore::new(&args.state);
    let Some(persisted) = store.load()? else {
        return Err(CliError::snapshot(format!(
            "no persisted state at {}; run `escudero session --state <FILE>` first",
            args.state.display()
        )));
    };
    let entries = select_entries(
        &persisted.state.logs,
        args.category.as_deref(),
        args.level.map(LogLevel::from),
        args.limit,
    );
    match OutputFormat::from(args.format) {
        OutputFormat::Json => println!("{}", render_json(&entries)?),
        OutputFormat::Text => print_entries(config, args, &persisted, &entries),
    }
    Ok(())
}

/// Filters the log, newest first. A `limit` of zero keeps everything.
#[must_use]
pub fn select_entries<'a>(
    logs: &'a LogBook,
    category: Option<&'a str>,
    level: Option<LogLevel>,
    limit: usize,
) -> Vec<&'a LogEntry> {
    let mut selected: Vec<&'a LogEntry> = match category {
        Some(category) => logs.entries_for_category(category).collect(),
        None => logs.iter().collect(),
    };
    if let Some(min) = level {
        selected.retain(|entry| entry.level() >= min);
    }
    if limit > 0 {
        selected.truncate(limit);
    }
    selected
}

fn print_entries(
    config: &CliConfig,
    args: &LogsArgs,
    persisted: &PersistedState,
    entries: &[&LogEntry],
) {
    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.header(&format!("Logs: {}", args.state.display()));
    if !persisted.recorded_by.is_empty() {
        reporter.info(&format!("Recorded by escudo {}", persisted.recorded_by));
    }
    if entries.is_empty() {
        reporter.info("No matching entries");
        return;
    }
    for entry in entries {
        reporter.log_line(entry);
    }
    reporter.info(&format!(
        "{} of {} entries shown",
        entries.len(),
        persisted.state.logs.len()
    ));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::FormatArg;
    use escudo::state::SharedState;
    use std::path::PathBuf;

    fn entry(timestamp: u64, category: &str, action: &str) -> LogEntry {
        LogEntry::with_timestamp(timestamp, category, action, serde_json::Map::new())
    }

    // Newest first, matching the book's wire order.
    fn seeded_book() -> LogBook {
        LogBook::from(vec![
            entry(4_000, "system", "initialized"),
            entry(3_000, "training", "demonstrationFailed"),
            entry(2_000, "security", "attackAttempt"),
            entry(1_000, "scan", "completed"),
        ])
    }

    fn seeded_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("state.json");
        let state = SharedState {
            logs: seeded_book(),
            ..SharedState::default()
        };
        let mut store = JsonFileStore::new(&path);
        store
            .save(&PersistedState::new("0.3.1", state))
            .unwrap();
        path
    }

    fn logs_args(state: PathBuf) -> LogsArgs {
        LogsArgs {
            state,
            category: None,
            level: None,
            limit: 20,
            format: FormatArg::Text,
        }
    }

    #[test]
    fn test_select_all_newest_first() {
        let book = seeded_book();
        let selected = select_entries(&book, None, None, 0);
        assert_eq!(selected.len(), 4);
        assert_eq!(selected[0].action, "initialized");
        assert_eq!(selected[3].action, "completed");
    }

    #[test]
    fn test_select_by_category() {
        let book = seeded_book();
        let selected = select_entries(&book, Some("security"), None, 0);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].action, "attackAttempt");
    }

    #[test]
    fn test_select_by_level() {
        let book = seeded_book();
        let selected = select_entries(&book, None, Some(LogLevel::Warn), 0);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].action, "demonstrationFailed");
        assert_eq!(selected[1].action, "attackAttempt");
    }

    #[test]
    fn test_select_combines_filters() {
        let book = seeded_book();
        let selected = select_entries(&book, Some("training"), Some(LogLevel::Error), 0);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].action, "demonstrationFailed");

        let none = select_entries(&book, Some("scan"), Some(LogLevel::Error), 0);
        assert!(none.is_empty());
    }

    #[test]
    fn test_limit_keeps_newest() {
        let book = seeded_book();
        let selected = select_entries(&book, None, None, 2);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].action, "initialized");
        assert_eq!(selected[1].action, "demonstrationFailed");
    }

    #[test]
    fn test_execute_logs_text() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::default();
        let args = logs_args(seeded_file(&dir));
        let result = execute_logs(&config, &args);
        assert!(result.is_ok());
    }

    #[test]
    fn test_execute_logs_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::default();
        let mut args = logs_args(seeded_file(&dir));
        args.format = FormatArg::Json;
        let result = execute_logs(&config, &args);
        assert!(result.is_ok());
    }

    #[test]
    fn test_execute_logs_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::default();
        let mut args = logs_args(seeded_file(&dir));
        args.category = Some("security".to_string());
        args.level = Some(crate::LevelArg::Warn);
        let result = execute_logs(&config, &args);
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_state_file_is_an_error() {
        let config = CliConfig::default();
        let args = logs_args(PathBuf::from("/nonexistent/state.json"));
        let err = execute_logs(&config, &args).unwrap_err();
        assert!(err.to_string().contains("no persisted state"));
    }
}
