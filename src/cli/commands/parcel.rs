//! Parcel command handlers.
//!
//! Implements `intake`, `collect`, `remove`, `verify`, and `parcels`.

use crate::app::Desk;
use crate::cli::args::{CollectArgs, IntakeArgs, OutputFormat, ParcelsArgs, RemoveArgs, VerifyArgs};
use crate::error::ParcelKeepError;
use crate::parcel::lifecycle::ParcelListing;
use crate::parcel::{IntakeDetails, Parcel, ParcelFilter, ParcelId};

use super::print_json;

/// Register a parcel.
///
/// # Errors
///
/// Returns a lifecycle error on validation failure, slot conflict, or an
/// unavailable store.
pub async fn intake(desk: &Desk, args: &IntakeArgs) -> Result<(), ParcelKeepError> {
    let details = IntakeDetails {
        resident_id: args.resident.clone(),
        apartment: args.apartment.clone(),
        category: args.category.clone(),
        description: args.description.clone(),
        courier: args.courier.clone(),
        notes: args.notes.clone(),
        slot_id: args.slot.clone(),
        received_by: args.received_by.clone(),
    };
    let parcel = desk.lifecycle().intake(&details).await?;

    match args.format {
        OutputFormat::Json => print_json(&parcel)?,
        OutputFormat::Human => {
            println!("Registered {} in slot {}", parcel.id, parcel.slot_id);
            println!("  apartment:  {}", parcel.apartment);
            println!("  category:   {}", parcel.category);
            println!("  verify:     {}", parcel.token.url);
            println!(
                "  expires:    {}",
                parcel.token.expires_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
    }
    Ok(())
}

/// Mark a parcel as collected.
///
/// # Errors
///
/// Returns a lifecycle error for an unknown or terminal parcel, a blank
/// collector, or a pickup time before arrival.
pub async fn collect(desk: &Desk, args: &CollectArgs) -> Result<(), ParcelKeepError> {
    let parcel = desk
        .lifecycle()
        .mark_collected(&ParcelId::new(args.id.trim()), &args.collector, args.at)
        .await?;
    print_transition(&parcel, args.format, "collected")
}

/// Mark a parcel as removed.
///
/// # Errors
///
/// Returns a lifecycle error for an unknown or terminal parcel.
pub async fn remove(desk: &Desk, args: &RemoveArgs) -> Result<(), ParcelKeepError> {
    let parcel = desk
        .lifecycle()
        .mark_removed(&ParcelId::new(args.id.trim()))
        .await?;
    print_transition(&parcel, args.format, "removed")
}

/// Check a verification token or URL.
///
/// # Errors
///
/// Returns a lifecycle error when the token is malformed, tampered with,
/// or expired.
#[allow(clippy::unused_async)]
pub async fn verify(desk: &Desk, args: &VerifyArgs) -> Result<(), ParcelKeepError> {
    let claims = desk.lifecycle().verify(token_from_input(&args.token))?;
    match args.format {
        OutputFormat::Json => print_json(&claims)?,
        OutputFormat::Human => {
            println!("Valid token for parcel {} in slot {}", claims.parcel_id, claims.slot_id);
            println!(
                "  issued:  {}",
                claims.issued_at.format("%Y-%m-%d %H:%M UTC")
            );
            println!(
                "  expires: {}",
                claims.expires_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
    }
    Ok(())
}

/// List parcels with their escalation state.
///
/// # Errors
///
/// Returns a lifecycle error if the store cannot be read.
pub async fn list(desk: &Desk, args: &ParcelsArgs) -> Result<(), ParcelKeepError> {
    let filter = ParcelFilter {
        status: args.status,
        apartment: args.apartment.clone(),
        slot_id: args.slot.clone(),
    };
    let listings = desk.lifecycle().list_with_escalation(&filter).await?;

    match args.format {
        OutputFormat::Json => print_json(&listings)?,
        OutputFormat::Human => print_listings(&listings),
    }
    Ok(())
}

fn print_listings(listings: &[ParcelListing]) {
    if listings.is_empty() {
        println!("No parcels match the given filters.");
        return;
    }
    println!(
        "{:<8}{:<6}{:<10}{:<16}{:<18}{}",
        "ID", "SLOT", "APT", "STATUS", "ESCALATION", "ARRIVED"
    );
    for listing in listings {
        let p = &listing.parcel;
        println!(
            "{:<8}{:<6}{:<10}{:<16}{:<18}{}",
            p.id.as_str(),
            p.slot_id.as_str(),
            p.apartment,
            p.status.to_string(),
            format!("{:?}", listing.escalation),
            p.arrived_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_transition(
    parcel: &Parcel,
    format: OutputFormat,
    verb: &str,
) -> Result<(), ParcelKeepError> {
    match format {
        OutputFormat::Json => print_json(parcel)?,
        OutputFormat::Human => {
            println!("Parcel {} {verb}; slot {} is free", parcel.id, parcel.slot_id);
        }
    }
    Ok(())
}

/// Accepts either a bare token or a verification URL ending in
/// `/verify/<token>`.
fn token_from_input(input: &str) -> &str {
    let input = input.trim();
    input
        .rsplit_once("/verify/")
        .map_or(input, |(_, token)| token.trim_end_matches('/'))
}
