//! Persisted engine state
//!
//! A snapshot is a pretty-printed JSON document holding everything needed
//! to rebuild a [`crate::BacklogHandle`]: items, the id counter, the
//! iteration cursor, velocity history and the audit journal.

use crate::error::{BacklogError, BacklogResult};
use crate::journal::JournalEvent;
use backlog_model::WorkItem;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable engine state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogSnapshot {
    /// Layout version
    pub version: u32,
    /// Planner cursor
    pub current_iteration: u32,
    /// Next id the store hands out
    pub next_id: u64,
    /// Items in id order
    pub items: Vec<WorkItem>,
    /// Delivered effort per closed iteration, oldest first
    pub velocity_history: Vec<u32>,
    /// Audit journal
    #[serde(default)]
    pub journal: Vec<JournalEvent>,
}

impl BacklogSnapshot {
    /// Encode as pretty JSON
    ///
    /// # Errors
    /// Returns [`BacklogError::Snapshot`] if encoding fails
    pub fn to_json(&self) -> BacklogResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON, rejecting unknown layout versions
    ///
    /// # Errors
    /// Returns [`BacklogError::Snapshot`] for malformed input or a newer
    /// version
    pub fn from_json(source: &str) -> BacklogResult<Self> {
        let snapshot: Self = serde_json::from_str(source)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(BacklogError::Snapshot(format!(
                "unsupported snapshot version {} (expected <= {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    /// Write to `path`
    ///
    /// # Errors
    /// Returns [`BacklogError::Io`] or [`BacklogError::Snapshot`]
    pub fn save(&self, path: impl AsRef<Path>) -> BacklogResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read from `path`
    ///
    /// # Errors
    /// Returns [`BacklogError::Io`] or [`BacklogError::Snapshot`]
    pub fn load(path: impl AsRef<Path>) -> BacklogResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json(&source)
    }
}
