//! Logging, metrics, and slot-event publication.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{
    EventBroadcaster, JsonlBroadcaster, SLOT_UPDATED_TOPIC, SlotUpdate, publish_slot_update,
};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
