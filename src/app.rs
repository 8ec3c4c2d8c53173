//! Wiring of the desk's components from configuration.
//!
//! [`Desk`] owns one instance of every service and is shared by the CLI
//! commands and the HTTP API. Collaborators (store, directories, notifier,
//! event sink, clock) are built separately in [`Collaborators`] so tests
//! can substitute fakes.

use std::sync::Arc;

use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::schema::{EventSink, NotifierKind, ParcelKeepConfig, StoreConfig};
use crate::directory::{ResidentDirectory, StaffDirectory, StaticDirectory};
use crate::error::{ConfigError, ParcelKeepError};
use crate::escalation::{EscalationEngine, SweepScheduler};
use crate::notify::{Dispatcher, LogNotifier, Notifier, WebhookNotifier};
use crate::observability::{EventBroadcaster, JsonlBroadcaster};
use crate::parcel::LifecycleManager;
use crate::slot::SlotRegistry;
use crate::store::{FileStore, MemoryStore, Store};
use crate::token::TokenService;

/// External services the desk depends on.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Durable store.
    pub store: Arc<dyn Store>,
    /// Resident lookups.
    pub residents: Arc<dyn ResidentDirectory>,
    /// Staff lookups.
    pub staff: Arc<dyn StaffDirectory>,
    /// Email and in-app delivery.
    pub notifier: Arc<dyn Notifier>,
    /// `slotUpdated` sink.
    pub events: Arc<dyn EventBroadcaster>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Builds the collaborators named by `config`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the snapshot file cannot be loaded, an I/O
    /// error if the event file cannot be opened, and a config error for an
    /// unusable webhook URL.
    pub async fn from_config(config: &ParcelKeepConfig) -> Result<Self, ParcelKeepError> {
        let store: Arc<dyn Store> = match &config.store {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::File { path } => Arc::new(FileStore::open(path.clone()).await?),
        };

        let directory = Arc::new(StaticDirectory::new(
            config.directory.residents.clone(),
            config.directory.staff.clone(),
        ));

        let notifier: Arc<dyn Notifier> = match (config.notifier.kind, &config.notifier.url) {
            (NotifierKind::Webhook, Some(url)) => {
                Arc::new(WebhookNotifier::new(url.clone(), config.notifier.timeout)?)
            }
            (NotifierKind::Webhook, None) => {
                return Err(ConfigError::InvalidValue {
                    field: "notifier.url".to_owned(),
                    value: String::new(),
                    expected: "a webhook URL".to_owned(),
                }
                .into());
            }
            (NotifierKind::Log, _) => Arc::new(LogNotifier::new()),
        };

        let events: Arc<dyn EventBroadcaster> = match (config.events.sink, &config.events.path) {
            (EventSink::Stderr, _) => Arc::new(JsonlBroadcaster::stderr()),
            (EventSink::Stdout, _) => Arc::new(JsonlBroadcaster::stdout()),
            (EventSink::File, Some(path)) => Arc::new(JsonlBroadcaster::from_file(path)?),
            (EventSink::File, None) => {
                return Err(ConfigError::InvalidValue {
                    field: "events.path".to_owned(),
                    value: String::new(),
                    expected: "a file path".to_owned(),
                }
                .into());
            }
            (EventSink::Discard, _) => Arc::new(JsonlBroadcaster::noop()),
        };

        Ok(Self {
            store,
            residents: Arc::clone(&directory) as Arc<dyn ResidentDirectory>,
            staff: directory,
            notifier,
            events,
            clock: Arc::new(SystemClock),
        })
    }
}

/// The assembled front desk.
#[derive(Debug, Clone)]
pub struct Desk {
    lifecycle: LifecycleManager,
    slots: SlotRegistry,
    engine: Arc<EscalationEngine>,
    scheduler: Arc<SweepScheduler>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Desk {
    /// Builds every collaborator from `config` and assembles the desk.
    ///
    /// # Errors
    ///
    /// See [`Collaborators::from_config`] and [`Desk::assemble`].
    pub async fn from_config(config: &ParcelKeepConfig) -> Result<Self, ParcelKeepError> {
        let collaborators = Collaborators::from_config(config).await?;
        let desk = Self::assemble(config, collaborators)?;
        info!(
            store = ?config.store,
            notifier = ?config.notifier.kind,
            residents = config.directory.residents.len(),
            staff = config.directory.staff.len(),
            "desk assembled"
        );
        Ok(desk)
    }

    /// Assembles the desk services over the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the token secret or TTL is
    /// unusable.
    pub fn assemble(
        config: &ParcelKeepConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        let Collaborators {
            store,
            residents,
            staff,
            notifier,
            events,
            clock,
        } = collaborators;

        let tokens = Arc::new(TokenService::new(
            config.token.secret.as_bytes(),
            config.token.ttl,
            config.desk.verify_base_url.clone(),
        )?);
        let dispatcher = Dispatcher::new(notifier, config.notifier.timeout);

        let lifecycle = LifecycleManager::new(
            Arc::clone(&store),
            tokens,
            events,
            Arc::clone(&residents),
            dispatcher.clone(),
            Arc::clone(&clock),
        )
        .with_id_prefix(config.desk.parcel_id_prefix.clone());

        let engine = Arc::new(EscalationEngine::new(
            Arc::clone(&store),
            residents,
            staff,
            dispatcher,
            Arc::clone(&clock),
        ));
        let scheduler = Arc::new(
            SweepScheduler::new(Arc::clone(&engine), config.sweep.interval)
                .with_run_on_start(config.sweep.run_on_start),
        );

        Ok(Self {
            lifecycle,
            slots: SlotRegistry::new(Arc::clone(&store)),
            engine,
            scheduler,
            store,
            clock,
        })
    }

    /// Parcel intake and transitions.
    #[must_use]
    pub const fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// Slot occupancy.
    #[must_use]
    pub const fn slots(&self) -> &SlotRegistry {
        &self.slots
    }

    /// Escalation sweep.
    #[must_use]
    pub fn engine(&self) -> &EscalationEngine {
        &self.engine
    }

    /// Periodic sweep driver.
    #[must_use]
    pub fn scheduler(&self) -> Arc<SweepScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    /// Time source shared by every component.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(extra: &str) -> ParcelKeepConfig {
        serde_yaml::from_str(&format!(
            "token:\n  secret: 0123456789abcdef0123456789abcdef\nevents:\n  sink: discard\n{extra}"
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_memory_desk_from_config() {
        let desk = Desk::from_config(&config("")).await.unwrap();
        let summary = desk.slots().occupancy_summary().await.unwrap();
        assert_eq!(summary.occupied, 0);
        assert_eq!(summary.available, 50);
    }

    #[tokio::test]
    async fn test_short_secret_is_rejected_at_assembly() {
        let mut cfg = config("");
        cfg.token.secret = "short".to_owned();
        let err = Desk::from_config(&cfg).await.unwrap_err();
        assert!(matches!(err, ParcelKeepError::Config(_)));
    }

    #[tokio::test]
    async fn test_file_sink_without_path_is_rejected() {
        let mut cfg = config("");
        cfg.events.sink = EventSink::File;
        let err = Desk::from_config(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("events.path"));
    }

    #[tokio::test]
    async fn test_file_store_desk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let cfg = config(&format!("store:\n  kind: file\n  path: {}\n", path.display()));
        let desk = Desk::from_config(&cfg).await.unwrap();
        assert_eq!(desk.scheduler().interval().as_secs(), 24 * 60 * 60);
    }
}
