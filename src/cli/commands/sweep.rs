//! One-shot escalation sweep.

use crate::app::Desk;
use crate::cli::args::{OutputFormat, SweepArgs};
use crate::error::ParcelKeepError;

use super::print_json;

/// Run one sweep at `--at` or now and print the report.
///
/// # Errors
///
/// Returns a store error if active parcels cannot be listed.
pub async fn run(desk: &Desk, args: &SweepArgs) -> Result<(), ParcelKeepError> {
    let report = match args.at {
        Some(at) => desk.engine().sweep(at).await?,
        None => desk.engine().run_once().await?,
    };

    match args.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Human => {
            println!(
                "Sweep at {}: {} parcels scanned",
                report.at.format("%Y-%m-%d %H:%M UTC"),
                report.scanned
            );
            println!("  reminders:         {}", report.reminders);
            println!("  final warnings:    {}", report.final_warnings);
            println!("  removal alerts:    {}", report.removal_alerts);
            println!("  already sent:      {}", report.already_sent);
            if report.skipped > 0 {
                println!("  skipped:           {}", report.skipped);
            }
            if report.delivery_failures > 0 {
                println!("  delivery failures: {} (not recorded; rerun to retry)", report.delivery_failures);
            }
            if report.failed > 0 {
                println!("  failed parcels:    {}", report.failed);
            }
        }
    }
    Ok(())
}
