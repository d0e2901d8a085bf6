//! Escudero: command-line surface for the Escudo suite
//!
//! Wraps the escudo library in subcommands: scan page snapshots, detect
//! React capabilities, install the protection guard, rehearse attack
//! demonstrations, replay attack calls through the guard, and drive full
//! popup/background/page sessions.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;
mod snapshot;

pub use commands::{
    AttackArgs, Cli, ColorArg, Commands, DemoArgs, DetectArgs, FormatArg, LevelArg, LogsArgs,
    ProtectArgs, ScanArgs, SessionArgs, SeverityArg, SurfaceArg,
};
pub use config::{load_runtime_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_json, OutputFormat, Reporter};
pub use snapshot::{expand_patterns, load_world, resolve_world, sample_world, write_world};
