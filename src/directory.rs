//! Resident and staff directories.
//!
//! Identity lives outside this crate; the desk only needs to look people up.
//! Residents are referenced everywhere by [`ResidentId`], the directory's
//! application-level resident code. The apartment number is a fallback
//! lookup key, never a second kind of resident reference.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// Application-level resident code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidentId(String);

impl ResidentId {
    /// Wraps a resident code.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Staff account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffId(String);

impl StaffId {
    /// Wraps a staff identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StaffId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resident as seen by the desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Resident {
    /// Resident code.
    pub id: ResidentId,
    /// Apartment number.
    pub apartment: String,
    /// Email address; residents without one only get in-app notices.
    #[serde(default)]
    pub email: Option<String>,
    /// Name used in notification greetings.
    pub display_name: String,
}

/// A staff account as seen by the desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Staff {
    /// Staff identifier.
    pub id: StaffId,
    /// Email address for removal alerts.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Resident lookups.
#[async_trait]
pub trait ResidentDirectory: Send + Sync + std::fmt::Debug {
    /// Finds a resident by code.
    async fn find_by_id(&self, id: &ResidentId) -> Result<Option<Resident>, DirectoryError>;

    /// Finds the resident registered for an apartment.
    async fn find_by_apartment(&self, apartment: &str)
    -> Result<Option<Resident>, DirectoryError>;
}

/// Staff lookups.
#[async_trait]
pub trait StaffDirectory: Send + Sync + std::fmt::Debug {
    /// Returns a snapshot of every staff account.
    async fn find_all_staff(&self) -> Result<Vec<Staff>, DirectoryError>;
}

/// Resolves the recipient of a resident notification: by resident code
/// first, then by apartment.
///
/// # Errors
///
/// Propagates directory failures; a resident that simply does not exist
/// resolves to `Ok(None)`.
pub async fn resolve_resident(
    directory: &dyn ResidentDirectory,
    resident_id: Option<&ResidentId>,
    apartment: &str,
) -> Result<Option<Resident>, DirectoryError> {
    if let Some(id) = resident_id {
        if let Some(resident) = directory.find_by_id(id).await? {
            return Ok(Some(resident));
        }
        tracing::debug!(resident_id = %id, apartment, "resident code unknown, falling back to apartment");
    }
    directory.find_by_apartment(apartment).await
}

/// Directory backed by the `directory` section of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    residents: Vec<Resident>,
    staff: Vec<Staff>,
}

impl StaticDirectory {
    /// Creates a directory over fixed resident and staff lists.
    #[must_use]
    pub const fn new(residents: Vec<Resident>, staff: Vec<Staff>) -> Self {
        Self { residents, staff }
    }
}

#[async_trait]
impl ResidentDirectory for StaticDirectory {
    async fn find_by_id(&self, id: &ResidentId) -> Result<Option<Resident>, DirectoryError> {
        Ok(self.residents.iter().find(|r| &r.id == id).cloned())
    }

    async fn find_by_apartment(
        &self,
        apartment: &str,
    ) -> Result<Option<Resident>, DirectoryError> {
        let wanted = apartment.trim();
        Ok(self
            .residents
            .iter()
            .find(|r| r.apartment.trim().eq_ignore_ascii_case(wanted))
            .cloned())
    }
}

#[async_trait]
impl StaffDirectory for StaticDirectory {
    async fn find_all_staff(&self) -> Result<Vec<Staff>, DirectoryError> {
        Ok(self.staff.clone())
    }
}
