use crate::storage::Storage;
use std::collections::HashSet;

/// Registration numbers already present in the store
///
/// Rebuilt from the store at the start of every crawl attempt and dropped when
/// the attempt ends. It is a lookup cache over the store and is never written
/// anywhere itself.
#[derive(Debug, Clone, Default)]
pub struct SeenIndex {
    ids: HashSet<String>,
}

impl SeenIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Bootstraps the index from the current store document
    ///
    /// Store reads degrade to an empty document, so a damaged store yields an
    /// empty index and the crawl proceeds as if starting fresh.
    pub fn load(store: &dyn Storage) -> Self {
        let doc = store.read();
        let ids: HashSet<String> = doc
            .data
            .into_iter()
            .map(|r| r.registration_number)
            .collect();

        if ids.is_empty() {
            tracing::info!("Seen index is empty, every row will be treated as new");
        } else {
            tracing::info!("Loaded {} known registration numbers", ids.len());
        }

        Self { ids }
    }

    /// Returns true if the registration number has been seen
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Records a registration number; returns false if it was already present
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Number of known registration numbers
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing has been seen
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
