//! `parcelkeep` - parcel reception, slot custody, and pickup escalation
//!
//! This library provides the components of a residential front desk:
//! parcel intake into a fixed bank of storage slots, verification tokens
//! for pickup, and a daily sweep that escalates uncollected parcels from
//! resident reminders to staff removal alerts.

pub mod api;
pub mod app;
pub mod cli;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod escalation;
pub mod notify;
pub mod observability;
pub mod parcel;
pub mod sequence;
pub mod slot;
pub mod store;
pub mod token;
