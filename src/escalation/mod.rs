//! Time-driven escalation of uncollected parcels.
//!
//! A sweep walks every parcel awaiting pickup and, depending on whole days
//! elapsed since arrival, sends the resident a reminder (day 4 on), a final
//! warning (day 10), or alerts every staff account (day 14). The
//! notification log gates every send, so sweeps can be repeated or overlap
//! without sending twice.

pub mod engine;
pub mod milestone;
pub mod scheduler;

pub use engine::{EscalationEngine, SweepReport};
pub use milestone::{
    Audience, EscalationState, Milestone, NotificationKey, NotificationRecord, RecipientId,
    days_elapsed, escalation_state,
};
pub use scheduler::SweepScheduler;
