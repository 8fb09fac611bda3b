//! BPOM Harvester: an incremental crawler for the BPOM product registry
//!
//! This crate walks the paginated, script-rendered product listing, normalizes
//! every table row into a [`record::Record`], and appends new records to a
//! deduplicated JSON store that the read API serves from.

pub mod api;
pub mod config;
pub mod crawler;
pub mod record;
pub mod render;
pub mod state;
pub mod storage;

use std::time::Duration;
use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Table never became ready ({selector}): {message}")]
    PageLoad { selector: String, message: String },

    #[error("Traversal failed on page {page}: {message}")]
    PageTraversal { page: u32, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::TraversalState,
        to: state::TraversalState,
    },

    #[error("Scheduler error: {0}")]
    Schedule(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// A table row from which no registration number can be derived
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("registration cell is missing")]
    MissingRegistration,

    #[error("registration cell has no registration number")]
    BlankRegistration,
}

/// Failures reported by the rendering capability
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("Page script failed: {0}")]
    Script(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for rendering operations
pub type RenderResult<T> = std::result::Result<T, RenderError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{normalize_row, RawRow, Record};
pub use state::{SeenIndex, TraversalState};
pub use storage::{JsonStore, Storage, StoreDocument};
