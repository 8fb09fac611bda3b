//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::record::Record;
use crate::storage::StoreDocument;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record {0} is already stored")]
    Duplicate(String),

    #[error("Store file {path} is unreadable ({reason}); refusing to overwrite it")]
    Corrupt { path: PathBuf, reason: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Reads degrade instead of failing; writes report every failure. A single
/// crawl process is assumed to be the only writer.
pub trait Storage: Send + Sync {
    /// Returns the current document
    ///
    /// A missing, empty, or corrupt backing resource yields the default empty
    /// document. The condition is logged, never returned.
    fn read(&self) -> StoreDocument;

    /// Appends one record and stamps `lastUpdated`
    ///
    /// # Errors
    ///
    /// * `StorageError::Duplicate` - the registration number is already stored
    /// * `StorageError::Corrupt` - the existing document cannot be parsed
    /// * `StorageError::Io` - the document could not be written
    fn append(&self, record: Record) -> StorageResult<()>;
}
