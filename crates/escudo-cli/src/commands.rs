//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Escudero: CLI for Escudo - React page security scanner and attack trainer
#[derive(Parser, Debug)]
#[command(name = "escudero")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan page snapshots for React security issues
    Scan(ScanArgs),

    /// Report React presence, version, and exposed capabilities
    Detect(DetectArgs),

    /// Install the protection guard on a page and rescan
    Protect(ProtectArgs),

    /// Run attack demonstrations against a page (training)
    ///
    /// Demonstrations show what injected code could do: read React
    /// internals, inject content through the root, enumerate cookies,
    /// install persistent hooks, or survey exfiltration channels. Every
    /// mutation is undone when the demonstration stops.
    Demo(DemoArgs),

    /// Replay an attack call through the guard and show what it logs
    Attack(AttackArgs),

    /// Run a live popup/background/page session end to end
    Session(SessionArgs),

    /// Show the activity log from a persisted state file
    Logs(LogsArgs),
}

/// Arguments for the scan command
#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Snapshot files or glob patterns
    pub snapshots: Vec<String>,

    /// Scan the built-in sample page instead of files
    #[arg(long)]
    pub sample: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,

    /// Show vulnerability class and risk details for each finding
    #[arg(long)]
    pub detail: bool,

    /// Exit non-zero when any finding reaches this severity
    #[arg(long, value_name = "SEVERITY")]
    pub fail_on: Option<SeverityArg>,
}

/// Arguments for the detect command
#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// Snapshot file
    pub snapshot: Option<PathBuf>,

    /// Inspect the built-in sample page
    #[arg(long)]
    pub sample: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the protect command
#[derive(Parser, Debug)]
pub struct ProtectArgs {
    /// Snapshot file
    pub snapshot: Option<PathBuf>,

    /// Protect the built-in sample page
    #[arg(long)]
    pub sample: bool,

    /// Write the hardened snapshot to this path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the demo command
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Demonstration to run: reactInternals, domManipulation, cookieAccess,
    /// persistentHook, or exfiltration
    #[arg(required_unless_present = "auto", conflicts_with = "auto")]
    pub attack: Option<String>,

    /// Run the automatic demonstration cycle instead of a single attack
    #[arg(long)]
    pub auto: bool,

    /// Snapshot file
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// Demonstrate against the built-in sample page
    #[arg(long)]
    pub sample: bool,

    /// How long each demonstration stays on screen in the cycle (ms)
    #[arg(long, default_value = "800")]
    pub observe_ms: u64,

    /// Pause between demonstrations in the cycle (ms)
    #[arg(long, default_value = "200")]
    pub between_ms: u64,

    /// Wait before the cycle starts (ms)
    #[arg(long, default_value = "100")]
    pub settle_ms: u64,

    /// Tick period of the persistent hook indicator (ms)
    #[arg(long, default_value = "250")]
    pub hook_interval_ms: u64,

    /// Hook intervals to advance for a single persistentHook run
    #[arg(long, default_value = "3")]
    pub ticks: u64,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the attack command
#[derive(Parser, Debug)]
pub struct AttackArgs {
    /// Surface to replay
    pub surface: SurfaceArg,

    /// Snapshot file
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// Attack the built-in sample page
    #[arg(long)]
    pub sample: bool,

    /// Install the guard before replaying
    #[arg(long)]
    pub protect: bool,

    /// Replay as an application call instead of an injected one
    #[arg(long)]
    pub legitimate: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Attack surface replayed by the attack command
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceArg {
    /// Call ReactDOM.render with attacker markup
    Render,
    /// Call ReactDOM.createRoot, then render into the root
    CreateRoot,
    /// Read and overwrite sensitive localStorage keys
    Storage,
    /// Read and overwrite document.cookie
    Cookies,
    /// Insert a hidden credential-harvesting form
    Inject,
}

/// Arguments for the session command
#[derive(Parser, Debug)]
pub struct SessionArgs {
    /// Snapshot file
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// Run the session against the built-in sample page
    #[arg(long)]
    pub sample: bool,

    /// Persist background state to this JSON file across runs
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Session runtime settings file (camelCase JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Apply protection during the session
    #[arg(long)]
    pub protect: bool,

    /// Activate training mode and run this demonstration
    #[arg(long, value_name = "ATTACK")]
    pub demo: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the logs command
#[derive(Parser, Debug)]
pub struct LogsArgs {
    /// Persisted state file written by `session --state`
    pub state: PathBuf,

    /// Only entries in this category (scan, detection, protection,
    /// training, security, system)
    #[arg(long)]
    pub category: Option<String>,

    /// Only entries at or above this level
    #[arg(long, value_name = "LEVEL")]
    pub level: Option<LevelArg>,

    /// Maximum entries to show, newest first (0 = all)
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON on stdout
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Severity threshold argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeverityArg {
    /// Hygiene findings and up
    Low,
    /// MEDIUM and up
    Medium,
    /// HIGH and up
    High,
    /// CRITICAL only
    Critical,
}

impl From<SeverityArg> for escudo::state::Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Low => Self::Low,
            SeverityArg::Medium => Self::Medium,
            SeverityArg::High => Self::High,
            SeverityArg::Critical => Self::Critical,
        }
    }
}

/// Log level threshold argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelArg {
    /// Everything
    Debug,
    /// Routine operations and up
    Info,
    /// Security-relevant activity and up
    Warn,
    /// Failures only
    Error,
}

impl From<LevelArg> for escudo::logbook::LogLevel {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::Debug => Self::Debug,
            LevelArg::Info => Self::Info,
            LevelArg::Warn => Self::Warn,
            LevelArg::Error => Self::Error,
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
