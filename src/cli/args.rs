//! CLI argument definitions.
//!
//! All Clap derive structs for `parcelkeep` command-line parsing.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;
use crate::parcel::ParcelStatus;
use crate::slot::SlotId;

// ============================================================================
// Root CLI
// ============================================================================

/// Parcel reception, slot custody, and pickup escalation for a front desk.
#[derive(Parser, Debug)]
#[command(name = "parcelkeep", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "PARCELKEEP_COLOR")]
    pub color: ColorChoice,

    /// Log line format.
    #[arg(long, default_value = "human", global = true, env = "PARCELKEEP_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Path to the desk configuration file.
    #[arg(short, long, global = true, env = "PARCELKEEP_CONFIG")]
    pub config: Option<PathBuf>,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a parcel into a free slot.
    Intake(IntakeArgs),

    /// Hand a parcel over to its resident.
    Collect(CollectArgs),

    /// Take a parcel out of its slot without a pickup.
    Remove(RemoveArgs),

    /// Check a verification token.
    Verify(VerifyArgs),

    /// Show slot occupancy.
    Slots(SlotsArgs),

    /// List parcels.
    Parcels(ParcelsArgs),

    /// Run one escalation sweep.
    Sweep(SweepArgs),

    /// Serve the HTTP API and run the sweep scheduler.
    Serve(ServeArgs),

    /// Inspect configuration files.
    Config(ConfigCommand),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Parcel Commands
// ============================================================================

/// Arguments for `intake`.
#[derive(Args, Debug)]
pub struct IntakeArgs {
    /// Apartment the parcel is addressed to.
    #[arg(short, long)]
    pub apartment: String,

    /// Parcel category (box, envelope, perishable, ...).
    #[arg(long)]
    pub category: String,

    /// Slot to store the parcel in (L1..L50).
    #[arg(short, long)]
    pub slot: String,

    /// Staff id of the receiving desk clerk.
    #[arg(short, long)]
    pub received_by: String,

    /// Resident code, when printed on the label.
    #[arg(long)]
    pub resident: Option<String>,

    /// Free-text description.
    #[arg(long)]
    pub description: Option<String>,

    /// Delivering courier.
    #[arg(long)]
    pub courier: Option<String>,

    /// Desk notes.
    #[arg(long)]
    pub notes: Option<String>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `collect`.
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Parcel identifier, e.g. `P007`.
    pub id: String,

    /// Name of the person picking the parcel up.
    #[arg(long)]
    pub collector: String,

    /// Pickup time (RFC 3339); defaults to now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `remove`.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Parcel identifier.
    pub id: String,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Token as scanned from the QR label, or the full verification URL.
    pub token: String,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `slots`.
#[derive(Args, Debug)]
pub struct SlotsArgs {
    /// Print only occupied/available counts.
    #[arg(long)]
    pub summary: bool,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `parcels`.
#[derive(Args, Debug)]
pub struct ParcelsArgs {
    /// Only parcels in this status (awaiting-pickup, collected, removed).
    #[arg(long)]
    pub status: Option<ParcelStatus>,

    /// Only parcels for this apartment.
    #[arg(short, long)]
    pub apartment: Option<String>,

    /// Only parcels in this slot.
    #[arg(short, long)]
    pub slot: Option<SlotId>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Escalation / Serving
// ============================================================================

/// Arguments for `sweep`.
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Evaluate elapsed days at this instant (RFC 3339) instead of now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address; overrides `http.bind`.
    #[arg(long, env = "PARCELKEEP_BIND")]
    pub bind: Option<SocketAddr>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "PARCELKEEP_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Do not run the escalation scheduler.
    #[arg(long)]
    pub no_sweep: bool,
}

// ============================================================================
// Config Command
// ============================================================================

/// Configuration commands.
#[derive(Args, Debug)]
pub struct ConfigCommand {
    /// Config subcommand.
    #[command(subcommand)]
    pub subcommand: ConfigSubcommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Load and validate a configuration file.
    Validate(ConfigValidateArgs),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
pub struct ConfigValidateArgs {
    /// Configuration file to validate.
    pub file: PathBuf,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

// ============================================================================
// Tests
// ============================================================================
