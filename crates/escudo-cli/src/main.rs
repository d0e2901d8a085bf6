//! Escudero: CLI for the Escudo React security suite
//!
//! ## Usage
//!
//! ```bash
//! escudero scan --sample                   # Scan the built-in sample page
//! escudero scan page.json --fail-on high  # Gate CI on serious findings
//! escudero protect --sample               # Install the guard and rescan
//! escudero demo cookieAccess --sample     # Rehearse one attack demonstration
//! escudero session --sample --protect     # Drive a full live session
//! ```

use clap::Parser;
use escudero::{handlers, Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match cli.command {
        Commands::Scan(args) => handlers::execute_scan(&config, &args),
        Commands::Detect(args) => handlers::execute_detect(&config, &args),
        Commands::Protect(args) => handlers::execute_protect(&config, &args),
        Commands::Demo(args) => handlers::execute_demo(&config, &args),
        Commands::Attack(args) => handlers::execute_attack(&config, &args),
        Commands::Session(args) => handlers::execute_session(&config, &args),
        Commands::Logs(args) => handlers::execute_logs(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

/// Library tracing goes to stderr so stdout stays clean for data output.
/// `RUST_LOG` overrides the verbosity mapping.
fn init_tracing(verbosity: Verbosity) {
    let default_filter = if verbosity.is_debug() {
        "escudo=debug,escudero=debug"
    } else if verbosity.is_verbose() {
        "escudo=info,escudero=info"
    } else {
        "escudo=error"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_default() {
        let cli = Cli::parse_from(["escudero", "scan", "--sample"]);
        let config = build_config(&cli);
        assert_eq!(config.verbosity, Verbosity::Normal);
        assert_eq!(config.color, ColorChoice::Auto);
    }

    #[test]
    fn test_build_config_verbose_levels() {
        let cli = Cli::parse_from(["escudero", "-v", "scan", "--sample"]);
        assert_eq!(build_config(&cli).verbosity, Verbosity::Verbose);

        let cli = Cli::parse_from(["escudero", "-vv", "scan", "--sample"]);
        assert_eq!(build_config(&cli).verbosity, Verbosity::Debug);
    }

    #[test]
    fn test_build_config_quiet_wins() {
        let cli = Cli::parse_from(["escudero", "--quiet", "-v", "scan", "--sample"]);
        assert_eq!(build_config(&cli).verbosity, Verbosity::Quiet);
    }

    #[test]
    fn test_build_config_color_never() {
        let cli = Cli::parse_from(["escudero", "--color", "never", "scan", "--sample"]);
        assert_eq!(build_config(&cli).color, ColorChoice::Never);
    }
}
