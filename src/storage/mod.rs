//! Storage module for persisting harvested records
//!
//! This module handles the on-disk dataset, including:
//! - The JSON store document (`lastUpdated` + ordered record list)
//! - Whole-file atomic rewrites on every append
//! - Degraded reads that never fail the caller
//!
//! The backend sits behind the [`Storage`] trait so a log-structured file or
//! an embedded key-value store can replace it without touching the crawler or
//! the read API.

mod json;
mod traits;

pub use json::{format_timestamp, JsonStore};
pub use traits::{Storage, StorageError, StorageResult};

use crate::record::Record;
use serde::{Deserialize, Serialize};

/// The full persisted dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    /// Local time of the last successful append, `YYYY-MM-DD HH:MM:SS`
    #[serde(default)]
    pub last_updated: Option<String>,

    /// Records in discovery order
    #[serde(default)]
    pub data: Vec<Record>,
}

impl StoreDocument {
    /// Returns true if a record with this registration number is stored
    pub fn contains(&self, registration_number: &str) -> bool {
        self.data
            .iter()
            .any(|r| r.registration_number == registration_number)
    }

    /// Finds a record by registration number
    pub fn find(&self, registration_number: &str) -> Option<&Record> {
        self.data
            .iter()
            .find(|r| r.registration_number == registration_number)
    }
}
