//! JSON file storage implementation
//!
//! The whole document is rewritten on every append: serialized to a sibling
//! temporary file, synced, then renamed over the target. Readers therefore see
//! either the previous or the next document, never a partial one.
//!
//! Each append costs O(n) in the number of stored records. Appends are paced by
//! page loads, so this holds at the registry's size.

use crate::record::Record;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::StoreDocument;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Format of `lastUpdated`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats a local time the way the store records it
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// What a raw load of the backing file produced
enum Loaded {
    Missing,
    Document(StoreDocument),
    Corrupt(String),
}

/// Store backed by a single pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Creates a store for the document at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Loaded {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Loaded::Missing,
            Err(e) => return Loaded::Corrupt(format!("read failed: {}", e)),
        };

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => return Loaded::Corrupt(format!("invalid UTF-8: {}", e)),
        };

        if text.trim().is_empty() {
            return Loaded::Corrupt("file is empty".to_string());
        }

        match serde_json::from_str::<StoreDocument>(&text) {
            Ok(doc) => Loaded::Document(doc),
            Err(e) => Loaded::Corrupt(format!("parse failed: {}", e)),
        }
    }

    fn write(&self, doc: &StoreDocument) -> StorageResult<()> {
        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        doc.serialize(&mut serializer)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
        }

        let tmp_path = self.tmp_path();
        let mut file = File::create(&tmp_path).map_err(|e| self.io_error(&tmp_path, e))?;
        file.write_all(&buf)
            .and_then(|_| file.sync_all())
            .map_err(|e| self.io_error(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            self.io_error(&self.path, e)
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Storage for JsonStore {
    fn read(&self) -> StoreDocument {
        match self.load() {
            Loaded::Document(doc) => doc,
            Loaded::Missing => {
                tracing::debug!("Store {} does not exist yet", self.path.display());
                StoreDocument::default()
            }
            Loaded::Corrupt(reason) => {
                tracing::warn!(
                    "Store {} is unreadable ({}), serving an empty document",
                    self.path.display(),
                    reason
                );
                StoreDocument::default()
            }
        }
    }

    fn append(&self, record: Record) -> StorageResult<()> {
        let mut doc = match self.load() {
            Loaded::Document(doc) => doc,
            Loaded::Missing => {
                tracing::info!("Creating new store file: {}", self.path.display());
                StoreDocument::default()
            }
            Loaded::Corrupt(reason) => {
                return Err(StorageError::Corrupt {
                    path: self.path.clone(),
                    reason,
                })
            }
        };

        if doc.contains(&record.registration_number) {
            return Err(StorageError::Duplicate(record.registration_number));
        }

        // Never move lastUpdated backwards, even if the local clock does.
        let now = format_timestamp(&Local::now());
        doc.last_updated = match doc.last_updated.take() {
            Some(previous) if previous > now => Some(previous),
            _ => Some(now),
        };
        doc.data.push(record);

        self.write(&doc)
    }
}
