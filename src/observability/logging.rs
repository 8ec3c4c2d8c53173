//! Logging initialization.
//!
//! Desk events (`parcel_id`, `slot`, `milestone`, `recipient` fields) are
//! what operators read, so `-v` and `-vv` raise only this crate's level.
//! The HTTP server and webhook client stay at `warn` until `-vvv`.
//! `PARCELKEEP_LOG_LEVEL` replaces the whole filter with any `EnvFilter`
//! directive.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable overriding the verbosity flags.
pub const LOG_LEVEL_ENV: &str = "PARCELKEEP_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// One flat JSON object per line; event fields sit at the top level.
    Json,
}

/// Maps `--quiet` and the `-v` count to a filter directive.
#[must_use]
pub const fn directive_for(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "warn",
        1 => "warn,parcelkeep=info",
        2 => "warn,parcelkeep=debug",
        _ => "trace",
    }
}

/// Decides whether human output gets ANSI colors.
#[must_use]
pub const fn ansi_enabled(color: ColorChoice, stderr_is_terminal: bool, no_color: bool) -> bool {
    match color {
        ColorChoice::Auto => stderr_is_terminal && !no_color,
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

/// Installs the global tracing subscriber on stderr.
///
/// A second call is ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, quiet: bool, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(directive_for(verbosity, quiet)));
    let show_target = verbosity >= 2;

    match format {
        LogFormat::Human => {
            let ansi = ansi_enabled(
                color,
                std::io::stderr().is_terminal(),
                std::env::var_os("NO_COLOR").is_some(),
            );
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_span_list(false)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
