//! Shared integration-test harness: an in-process desk wired to recording
//! fakes and a manual clock, plus a helper for running the binary.

#![allow(dead_code)]

use std::path::Path;
use std::process::Output;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use parcelkeep::app::{Collaborators, Desk};
use parcelkeep::clock::ManualClock;
use parcelkeep::config::ParcelKeepConfig;
use parcelkeep::directory::{
    Resident, ResidentDirectory, ResidentId, Staff, StaffId, StaticDirectory,
};
use parcelkeep::error::{DirectoryError, NotifyError, StoreError};
use parcelkeep::escalation::{NotificationKey, NotificationRecord};
use parcelkeep::notify::{EmailMessage, InAppMessage, Notifier};
use parcelkeep::observability::EventBroadcaster;
use parcelkeep::parcel::{IntakeDetails, Parcel, ParcelFilter, ParcelId};
use parcelkeep::slot::SlotId;
use parcelkeep::store::{MemoryStore, Store};

/// Signing secret used by every test desk.
pub const SECRET: &str = "0123456789abcdef0123456789abcdef";

/// Day 0 of every scenario: 2026-03-02 09:00 UTC.
pub fn day0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

/// `day0()` plus `n` whole days.
pub fn day(n: i64) -> DateTime<Utc> {
    day0() + Duration::days(n)
}

/// Minimal valid configuration.
pub fn test_config() -> ParcelKeepConfig {
    serde_yaml::from_str(&format!(
        "token:\n  secret: {SECRET}\ndesk:\n  verify_base_url: https://desk.example.org\n"
    ))
    .unwrap()
}

/// Residents: Ana in 4B (email), Ben in 7A (no email).
pub fn residents() -> Vec<Resident> {
    vec![
        Resident {
            id: ResidentId::new("R-100"),
            apartment: "4B".to_owned(),
            email: Some("ana@example.org".to_owned()),
            display_name: "Ana".to_owned(),
        },
        Resident {
            id: ResidentId::new("R-200"),
            apartment: "7A".to_owned(),
            email: None,
            display_name: "Ben".to_owned(),
        },
    ]
}

/// `n` staff accounts `S-1..S-n`, all with email.
pub fn staff(n: usize) -> Vec<Staff> {
    (1..=n)
        .map(|i| Staff {
            id: StaffId::new(format!("S-{i}")),
            email: Some(format!("staff{i}@example.org")),
            display_name: None,
        })
        .collect()
}

/// Intake input for apartment 4B in `slot`.
pub fn intake_for(slot: &str) -> IntakeDetails {
    IntakeDetails {
        resident_id: Some("R-100".to_owned()),
        apartment: "4B".to_owned(),
        category: "box".to_owned(),
        courier: Some("DHL".to_owned()),
        slot_id: slot.to_owned(),
        received_by: "S-1".to_owned(),
        ..IntakeDetails::default()
    }
}

// ============================================================================
// Recording notifier
// ============================================================================

/// Notifier that records every call and can be told to fail emails,
/// either all of them or those to particular addresses.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    emails: Mutex<Vec<EmailMessage>>,
    in_app: Mutex<Vec<InAppMessage>>,
    fail_emails: AtomicBool,
    failing_addresses: Mutex<Vec<String>>,
    attempts: AtomicUsize,
}

impl RecordingNotifier {
    pub fn emails(&self) -> Vec<EmailMessage> {
        self.emails.lock().unwrap().clone()
    }

    pub fn emails_to(&self, address: &str) -> Vec<EmailMessage> {
        self.emails()
            .into_iter()
            .filter(|e| e.to == address)
            .collect()
    }

    pub fn in_app(&self) -> Vec<InAppMessage> {
        self.in_app.lock().unwrap().clone()
    }

    pub fn set_fail_emails(&self, fail: bool) {
        self.fail_emails.store(fail, Ordering::SeqCst);
    }

    /// Fails every email to `address` until `restore_address` is called.
    pub fn fail_address(&self, address: &str) {
        self.failing_addresses.lock().unwrap().push(address.to_owned());
    }

    pub fn restore_address(&self, address: &str) {
        self.failing_addresses.lock().unwrap().retain(|a| a != address);
    }

    /// Email attempts, failed ones included.
    pub fn email_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.emails.lock().unwrap().clear();
        self.in_app.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn create_in_app(&self, message: &InAppMessage) -> Result<String, NotifyError> {
        let mut in_app = self.in_app.lock().unwrap();
        in_app.push(message.clone());
        Ok(format!("notice-{}", in_app.len()))
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_emails.load(Ordering::SeqCst)
            || self.failing_addresses.lock().unwrap().contains(&message.to)
        {
            return Err(NotifyError::Delivery("smtp relay refused".to_owned()));
        }
        self.emails.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// ============================================================================
// Recording broadcaster
// ============================================================================

/// Broadcaster that keeps every published event.
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().unwrap().clone()
    }

    /// `(slotId, status)` pairs of every `slotUpdated` event.
    pub fn slot_updates(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter(|(topic, _)| topic == "slotUpdated")
            .map(|(_, payload)| {
                (
                    payload["slotId"].as_str().unwrap_or_default().to_owned(),
                    payload["status"].as_str().unwrap_or_default().to_owned(),
                )
            })
            .collect()
    }
}

impl EventBroadcaster for RecordingEvents {
    fn publish(&self, topic: &str, payload: serde_json::Value) {
        self.events
            .lock()
            .unwrap()
            .push((topic.to_owned(), payload));
    }
}

// ============================================================================
// Flaky store
// ============================================================================

/// Store wrapper whose counter and writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_sequence: AtomicBool,
    fail_notifications: AtomicBool,
}

impl FlakyStore {
    pub fn set_fail_sequence(&self, fail: bool) {
        self.fail_sequence.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    fn outage() -> StoreError {
        StoreError::Unavailable("injected outage".to_owned())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn next_sequence(&self, name: &str) -> Result<u64, StoreError> {
        if self.fail_sequence.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.next_sequence(name).await
    }

    async fn insert_parcel(&self, parcel: &Parcel) -> Result<(), StoreError> {
        self.inner.insert_parcel(parcel).await
    }

    async fn update_parcel(&self, parcel: &Parcel) -> Result<(), StoreError> {
        self.inner.update_parcel(parcel).await
    }

    async fn get_parcel(&self, id: &ParcelId) -> Result<Option<Parcel>, StoreError> {
        self.inner.get_parcel(id).await
    }

    async fn active_parcel_in(&self, slot: &SlotId) -> Result<Option<ParcelId>, StoreError> {
        self.inner.active_parcel_in(slot).await
    }

    async fn list_parcels(&self, filter: &ParcelFilter) -> Result<Vec<Parcel>, StoreError> {
        self.inner.list_parcels(filter).await
    }

    async fn notification_exists(&self, key: &NotificationKey) -> Result<bool, StoreError> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.notification_exists(key).await
    }

    async fn insert_notification(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.insert_notification(record).await
    }

    async fn list_notifications(
        &self,
        parcel: Option<&ParcelId>,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        self.inner.list_notifications(parcel).await
    }
}

// ============================================================================
// Switchable resident directory
// ============================================================================

/// Resident directory that can be taken offline.
#[derive(Debug)]
pub struct SwitchableResidents {
    inner: StaticDirectory,
    down: AtomicBool,
}

impl SwitchableResidents {
    pub fn new(residents: Vec<Resident>) -> Self {
        Self {
            inner: StaticDirectory::new(residents, Vec::new()),
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DirectoryError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("injected outage".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl ResidentDirectory for SwitchableResidents {
    async fn find_by_id(&self, id: &ResidentId) -> Result<Option<Resident>, DirectoryError> {
        self.check()?;
        self.inner.find_by_id(id).await
    }

    async fn find_by_apartment(
        &self,
        apartment: &str,
    ) -> Result<Option<Resident>, DirectoryError> {
        self.check()?;
        self.inner.find_by_apartment(apartment).await
    }
}

// ============================================================================
// Test desk
// ============================================================================

/// An assembled desk plus handles on its fakes.
pub struct TestDesk {
    pub desk: Arc<Desk>,
    pub store: Arc<FlakyStore>,
    pub residents: Arc<SwitchableResidents>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: Arc<RecordingEvents>,
}

impl TestDesk {
    /// Desk with the default residents and three staff accounts.
    pub fn new() -> Self {
        Self::with_directory(residents(), staff(3))
    }

    pub fn with_directory(residents: Vec<Resident>, staff: Vec<Staff>) -> Self {
        Self::with_config(&test_config(), residents, staff)
    }

    pub fn with_config(
        config: &ParcelKeepConfig,
        residents: Vec<Resident>,
        staff: Vec<Staff>,
    ) -> Self {
        let store = Arc::new(FlakyStore::default());
        let clock = Arc::new(ManualClock::new(day0()));
        let notifier = Arc::new(RecordingNotifier::default());
        let events = Arc::new(RecordingEvents::default());
        let residents = Arc::new(SwitchableResidents::new(residents));
        let staff = Arc::new(StaticDirectory::new(Vec::new(), staff));

        let desk = Desk::assemble(
            config,
            Collaborators {
                store: Arc::clone(&store) as _,
                residents: Arc::clone(&residents) as _,
                staff,
                notifier: Arc::clone(&notifier) as _,
                events: Arc::clone(&events) as _,
                clock: Arc::clone(&clock) as _,
            },
        )
        .unwrap();

        Self {
            desk: Arc::new(desk),
            store,
            residents,
            clock,
            notifier,
            events,
        }
    }

    /// Moves the clock to `day(n)`.
    pub fn at_day(&self, n: i64) {
        self.clock.set(day(n));
    }
}

// ============================================================================
// Binary
// ============================================================================

/// Runs the `parcelkeep` binary to completion.
pub fn run_binary(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_parcelkeep"))
        .args(args)
        .env_remove("PARCELKEEP_CONFIG")
        .env_remove("PARCELKEEP_LOG_LEVEL")
        .output()
        .expect("failed to run parcelkeep")
}

/// Writes a file-store configuration into `dir` and returns its path.
pub fn write_file_config(dir: &Path) -> std::path::PathBuf {
    let store = dir.join("store.json");
    let config = dir.join("parcelkeep.yaml");
    std::fs::write(
        &config,
        format!(
            "\
desk:
  verify_base_url: https://desk.example.org
token:
  secret: {SECRET}
store:
  kind: file
  path: {}
events:
  sink: discard
directory:
  residents:
    - {{ id: R-100, apartment: 4B, email: ana@example.org, display_name: Ana }}
  staff:
    - {{ id: S-1, email: desk@example.org }}
",
            store.display()
        ),
    )
    .unwrap();
    config
}
