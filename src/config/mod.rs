//! YAML configuration: schema, loading with environment substitution, and
//! validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoadWarning, resolve_config_path};
pub use schema::{
    DeskConfig, DirectoryConfig, EventSink, EventsConfig, HttpConfig, NotifierConfig,
    NotifierKind, ParcelKeepConfig, StoreConfig, SweepConfig, TokenConfig,
};
pub use validation::{ValidationResult, Validator};
