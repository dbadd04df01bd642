pub mod hnsd;
pub mod store;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use hnsd::HnsdIngester;
pub use store::{FileRootStore, RootStore, StaticRootStore};

use crate::error::ErrorCategory;

/// Number of recent tree roots kept
pub const BLOCKS_TO_STORE: usize = 40;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RootStoreError {
    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid roots JSON: {0}")]
    Json(String),

    #[error("Invalid tree root {0:?}: expected 64 hex characters")]
    InvalidRoot(String),

    #[error("File watch error: {0}")]
    Watch(String),
}

impl RootStoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Json(_) | Self::InvalidRoot(_) => ErrorCategory::Structural,
            Self::Io { .. } | Self::Watch(_) => ErrorCategory::Transport,
        }
    }
}

impl From<serde_json::Error> for RootStoreError {
    fn from(e: serde_json::Error) -> Self {
        RootStoreError::Json(e.to_string())
    }
}

/// One observed name-tree commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootEntry {
    pub height: u32,
    pub timestamp: u64,
    pub tree_root: String,
}

impl RootEntry {
    /// The root is stored lower-cased; it must be 32 bytes of hex.
    pub fn new(height: u32, timestamp: u64, tree_root: &str) -> Result<Self, RootStoreError> {
        let is_hash = tree_root.len() == 64 && tree_root.bytes().all(|b| b.is_ascii_hexdigit());
        if !is_hash {
            return Err(RootStoreError::InvalidRoot(tree_root.to_string()));
        }
        Ok(Self {
            height,
            timestamp,
            tree_root: tree_root.to_ascii_lowercase(),
        })
    }
}

/// Bounded window of recent tree roots, oldest first.
///
/// Appending a root already present is a no-op; appending past capacity
/// evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedRootWindow {
    entries: VecDeque<RootEntry>,
    capacity: usize,
}

impl TrustedRootWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn from_entries<I>(entries: I, capacity: usize) -> Result<Self, RootStoreError>
    where
        I: IntoIterator<Item = RootEntry>,
    {
        let mut window = Self::new(capacity);
        for entry in entries {
            window.push(RootEntry::new(entry.height, entry.timestamp, &entry.tree_root)?);
        }
        Ok(window)
    }

    /// Returns false when the root was already present.
    pub fn push(&mut self, entry: RootEntry) -> bool {
        if self.find(&entry.tree_root).is_some() {
            return false;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        true
    }

    /// Look up a hex-encoded root, case-insensitively
    pub fn find(&self, tree_root: &str) -> Option<&RootEntry> {
        self.entries
            .iter()
            .find(|e| e.tree_root.eq_ignore_ascii_case(tree_root))
    }

    pub fn contains_root(&self, root: &[u8]) -> bool {
        self.find(&hex::encode(root)).is_some()
    }

    pub fn latest(&self) -> Option<&RootEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RootEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_json(&self) -> Result<String, RootStoreError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Parse `[{"height","timestamp","tree_root"}, ...]`, oldest first.
    pub fn from_json(json: &str, capacity: usize) -> Result<Self, RootStoreError> {
        let entries: Vec<RootEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries, capacity)
    }
}

impl Default for TrustedRootWindow {
    fn default() -> Self {
        Self::new(BLOCKS_TO_STORE)
    }
}
