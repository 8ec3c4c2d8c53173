//! Human-readable identifier allocation.

use std::sync::Arc;

use crate::error::StoreError;
use crate::store::Store;

/// Counter backing parcel identifiers.
pub const PARCEL_COUNTER: &str = "parcel";

/// Default parcel identifier prefix.
pub const DEFAULT_PARCEL_PREFIX: &str = "P";

/// Allocates strictly increasing integers from named store counters.
///
/// The increment happens inside the store, so concurrent callers never
/// observe the same value. Gaps are possible when the caller aborts after
/// allocating.
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    store: Arc<dyn Store>,
}

impl SequenceGenerator {
    /// Creates a generator over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Returns the next value of `counter`, starting at 1.
    ///
    /// # Errors
    ///
    /// Propagates the store error when the counter cannot be incremented.
    pub async fn next(&self, counter: &str) -> Result<u64, StoreError> {
        self.store.next_sequence(counter).await
    }

    /// Allocates the next value of `counter` and formats it with `prefix`.
    ///
    /// # Errors
    ///
    /// Propagates the store error when the counter cannot be incremented.
    pub async fn next_identifier(&self, counter: &str, prefix: &str) -> Result<String, StoreError> {
        Ok(format_identifier(prefix, self.next(counter).await?))
    }
}

/// Formats `seq` zero-padded to three digits: `P007`, `P999`, `P1000`.
#[must_use]
pub fn format_identifier(prefix: &str, seq: u64) -> String {
    format!("{prefix}{seq:03}")
}
