//! Slot occupancy display.

use crate::app::Desk;
use crate::cli::args::{OutputFormat, SlotsArgs};
use crate::error::ParcelKeepError;
use crate::slot::SlotStatus;

use super::print_json;

/// Slots per row in the human grid.
const GRID_WIDTH: usize = 10;

/// Print slot occupancy as a grid, a summary, or JSON.
///
/// # Errors
///
/// Returns a store error if active parcels cannot be read.
pub async fn run(desk: &Desk, args: &SlotsArgs) -> Result<(), ParcelKeepError> {
    if args.summary {
        let summary = desk.slots().occupancy_summary().await?;
        match args.format {
            OutputFormat::Json => print_json(&summary)?,
            OutputFormat::Human => println!(
                "{} occupied, {} available",
                summary.occupied, summary.available
            ),
        }
        return Ok(());
    }

    let views = desk.slots().list_slots().await?;
    match args.format {
        OutputFormat::Json => print_json(&views)?,
        OutputFormat::Human => {
            for row in views.chunks(GRID_WIDTH) {
                let line: Vec<String> = row
                    .iter()
                    .map(|v| {
                        let mark = match v.status {
                            SlotStatus::Occupied => '#',
                            SlotStatus::Available => '.',
                        };
                        format!("{:>4}{mark}", v.slot_id.as_str())
                    })
                    .collect();
                println!("{}", line.join(" "));
            }
            let occupied = views
                .iter()
                .filter(|v| v.status == SlotStatus::Occupied)
                .count();
            println!("\n# occupied ({occupied})   . available ({})", views.len() - occupied);
        }
    }
    Ok(())
}
