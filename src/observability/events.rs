//! Slot-status event publication.
//!
//! Occupancy-changing transitions publish `slotUpdated{slotId,status}`
//! through an [`EventBroadcaster`]. Publication is fire-and-forget: a
//! broadcaster never reports failure to the caller, and the slot listing
//! stays the source of truth for clients that miss an event.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::slot::{SlotId, SlotStatus};

/// Topic for slot occupancy changes.
pub const SLOT_UPDATED_TOPIC: &str = "slotUpdated";

/// Payload of [`SLOT_UPDATED_TOPIC`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotUpdate {
    /// Slot whose status changed.
    pub slot_id: SlotId,
    /// New status.
    pub status: SlotStatus,
}

/// Distributes events to connected clients.
pub trait EventBroadcaster: Send + Sync + std::fmt::Debug {
    /// Publishes `payload` under `topic`. Never fails.
    fn publish(&self, topic: &str, payload: serde_json::Value);
}

/// Publishes a [`SlotUpdate`].
pub fn publish_slot_update(broadcaster: &dyn EventBroadcaster, slot_id: &SlotId, status: SlotStatus) {
    let update = SlotUpdate {
        slot_id: slot_id.clone(),
        status,
    };
    match serde_json::to_value(&update) {
        Ok(payload) => broadcaster.publish(SLOT_UPDATED_TOPIC, payload),
        Err(e) => tracing::warn!(slot = %slot_id, error = %e, "could not encode slot update"),
    }
}

// ---------------------------------------------------------------------------
// JSONL stream
// ---------------------------------------------------------------------------

/// One line of the JSONL event stream.
#[derive(Debug, Serialize)]
struct EventLine<'a> {
    sequence: u64,
    timestamp: DateTime<Utc>,
    topic: &'a str,
    payload: serde_json::Value,
}

/// Thread-safe, buffered JSONL event writer.
///
/// Each event becomes one JSON object per line carrying a zero-based,
/// monotonically increasing `sequence`. Serialization and I/O failures are
/// dropped.
pub struct JsonlBroadcaster {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for JsonlBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlBroadcaster")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl JsonlBroadcaster {
    /// Creates a broadcaster writing to `writer`.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Discards every event.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Appends to the file at `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Number of events published so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl EventBroadcaster for JsonlBroadcaster {
    fn publish(&self, topic: &str, payload: serde_json::Value) {
        let line = EventLine {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            topic,
            payload,
        };

        if let Ok(mut w) = self.writer.lock()
            && let Ok(json) = serde_json::to_string(&line)
        {
            let _ = writeln!(w, "{json}");
            let _ = w.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn jsonl_lines_carry_sequence_and_topic() {
        let buf = Arc::new(StdMutex::new(Vec::new()));
        let broadcaster = JsonlBroadcaster::new(Box::new(TestWriter(Arc::clone(&buf))));
        let slot = SlotId::parse("L5").unwrap();

        publish_slot_update(&broadcaster, &slot, SlotStatus::Occupied);
        publish_slot_update(&broadcaster, &slot, SlotStatus::Available);

        let text = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[0]["topic"], "slotUpdated");
        assert_eq!(lines[0]["payload"]["slotId"], "L5");
        assert_eq!(lines[0]["payload"]["status"], "Occupied");
        assert_eq!(lines[1]["payload"]["status"], "Available");
        assert_eq!(broadcaster.event_count(), 2);
    }

    #[test]
    fn noop_counts_but_discards() {
        let broadcaster = JsonlBroadcaster::noop();
        broadcaster.publish("x", serde_json::json!({}));
        assert_eq!(broadcaster.event_count(), 1);
    }
}
