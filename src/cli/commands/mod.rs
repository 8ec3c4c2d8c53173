//! CLI command dispatch and handlers.
//!
//! Routes parsed CLI arguments to the appropriate command handler. Every
//! handler except `config validate` and `version` loads the desk
//! configuration first.

pub mod config;
pub mod parcel;
pub mod serve;
pub mod slots;
pub mod sweep;
pub mod version;

use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::app::Desk;
use crate::cli::args::{Cli, Commands, ConfigSubcommand};
use crate::config::{ConfigLoader, ParcelKeepConfig, resolve_config_path};
use crate::error::ParcelKeepError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` fires on SIGINT/SIGTERM and stops long-running commands.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), ParcelKeepError> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Intake(args) => parcel::intake(&load_desk(config_path).await?, &args).await,
        Commands::Collect(args) => parcel::collect(&load_desk(config_path).await?, &args).await,
        Commands::Remove(args) => parcel::remove(&load_desk(config_path).await?, &args).await,
        Commands::Verify(args) => parcel::verify(&load_desk(config_path).await?, &args).await,
        Commands::Parcels(args) => parcel::list(&load_desk(config_path).await?, &args).await,
        Commands::Slots(args) => slots::run(&load_desk(config_path).await?, &args).await,
        Commands::Sweep(args) => sweep::run(&load_desk(config_path).await?, &args).await,
        Commands::Serve(args) => {
            let config = load_config(config_path)?;
            serve::run(&config, &args, cancel).await
        }
        Commands::Config(cmd) => match cmd.subcommand {
            ConfigSubcommand::Validate(args) => config::validate(&args),
        },
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Loads the configuration named by `--config` or `PARCELKEEP_CONFIG`,
/// logging every load warning.
///
/// # Errors
///
/// Returns a usage error when no configuration file is given, or the
/// loader's error.
pub fn load_config(flag: Option<&Path>) -> Result<ParcelKeepConfig, ParcelKeepError> {
    let path = resolve_config_path(flag).ok_or_else(|| {
        ParcelKeepError::Usage(
            "no configuration file; pass --config or set PARCELKEEP_CONFIG".to_owned(),
        )
    })?;
    tracing::info!(config = %path.display(), "loading configuration");
    let loaded = ConfigLoader::load(&path)?;
    for warning in &loaded.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(ParcelKeepConfig::clone(&loaded.config))
}

async fn load_desk(flag: Option<&Path>) -> Result<Desk, ParcelKeepError> {
    let config = load_config(flag)?;
    Desk::from_config(&config).await
}

/// Prints `value` as pretty JSON on stdout.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), ParcelKeepError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
