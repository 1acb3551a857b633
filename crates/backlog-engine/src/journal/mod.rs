//! Append-only audit journal
//!
//! Every successful mutation of the backlog is recorded as a
//! [`JournalEvent`] whose SHA-256 hash covers the previous event's hash, so
//! any edit to recorded history breaks the chain.

use crate::error::JournalError;
use backlog_model::WorkItemId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Kind of recorded mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalAction {
    /// Item created
    Created,
    /// Status changed
    Transitioned,
    /// Item blocked
    Blocked,
    /// Effort changed
    ReEstimated,
    /// Item marked groomed
    Groomed,
    /// Owner changed
    Assigned,
    /// Iteration planned
    Planned,
    /// Iteration closed
    IterationClosed,
}

impl JournalAction {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Transitioned => "transitioned",
            Self::Blocked => "blocked",
            Self::ReEstimated => "re_estimated",
            Self::Groomed => "groomed",
            Self::Assigned => "assigned",
            Self::Planned => "planned",
            Self::IterationClosed => "iteration_closed",
        }
    }
}

impl fmt::Display for JournalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One recorded mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEvent {
    /// Random event id
    pub id: Uuid,
    /// Time of recording
    pub timestamp: DateTime<Utc>,
    /// Affected item, if the action concerns a single item
    pub item: Option<WorkItemId>,
    /// What happened
    pub action: JournalAction,
    /// Free-form description
    pub detail: String,
    /// Hash of the preceding event, zero for the first
    pub prev_hash: [u8; 32],
    /// Hash of this event
    pub hash: [u8; 32],
}

impl JournalEvent {
    /// Hex-encoded hash
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Hash-chained event log
#[derive(Debug, Default)]
pub struct Journal {
    inner: Mutex<Vec<JournalEvent>>,
}

impl Journal {
    /// Empty journal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a journal from persisted events, checking the chain
    ///
    /// # Errors
    /// Returns [`JournalError::IntegrityViolation`] if the events do not
    /// form a valid chain
    pub fn from_events(events: Vec<JournalEvent>) -> Result<Self, JournalError> {
        verify_chain(&events)?;
        Ok(Self {
            inner: Mutex::new(events),
        })
    }

    /// Record an event and return its id
    pub fn record(
        &self,
        action: JournalAction,
        item: Option<WorkItemId>,
        detail: impl Into<String>,
    ) -> Uuid {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map_or([0u8; 32], |e| e.hash);
        let mut event = JournalEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            item,
            action,
            detail: detail.into(),
            prev_hash,
            hash: [0u8; 32],
        };
        event.hash = compute_hash(&event);
        let id = event.id;
        guard.push(event);
        id
    }

    /// Copy of all events, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<JournalEvent> {
        self.inner.lock().clone()
    }

    /// Events concerning `item`
    #[must_use]
    pub fn events_for(&self, item: WorkItemId) -> Vec<JournalEvent> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.item == Some(item))
            .cloned()
            .collect()
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// No events recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Recompute the hash chain
    ///
    /// # Errors
    /// Returns [`JournalError::IntegrityViolation`] naming the first event
    /// whose link or hash does not match
    pub fn verify_integrity(&self) -> Result<(), JournalError> {
        verify_chain(&self.inner.lock())
    }
}

fn verify_chain(events: &[JournalEvent]) -> Result<(), JournalError> {
    let mut prev = [0u8; 32];
    for (index, event) in events.iter().enumerate() {
        if event.prev_hash != prev || event.hash != compute_hash(event) {
            return Err(JournalError::IntegrityViolation { index });
        }
        prev = event.hash;
    }
    Ok(())
}

fn compute_hash(event: &JournalEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.id.as_bytes());
    hasher.update(event.timestamp.timestamp_micros().to_le_bytes());
    hasher.update(event.item.map_or(0, WorkItemId::get).to_le_bytes());
    hasher.update(event.action.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(event.detail.as_bytes());
    hasher.update([0]);
    hasher.update(event.prev_hash);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Journal {
        let journal = Journal::new();
        journal.record(JournalAction::Created, Some(WorkItemId(1)), "created #1");
        journal.record(JournalAction::Transitioned, Some(WorkItemId(1)), "BACKLOG -> READY");
        journal.record(JournalAction::Planned, None, "iteration 1: 1 item");
        journal
    }

    #[test]
    fn chain_links_events() {
        let journal = sample();
        let events = journal.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].prev_hash, [0u8; 32]);
        assert_eq!(events[1].prev_hash, events[0].hash);
        assert_eq!(events[2].prev_hash, events[1].hash);
        assert!(journal.verify_integrity().is_ok());
        assert_eq!(events[0].hash_hex().len(), 64);
    }

    #[test]
    fn tampering_is_detected() {
        let mut events = sample().events();
        events[1].detail = "BACKLOG -> DONE".into();
        assert_eq!(
            Journal::from_events(events).unwrap_err(),
            JournalError::IntegrityViolation { index: 1 }
        );
    }

    #[test]
    fn dropped_event_is_detected() {
        let mut events = sample().events();
        events.remove(0);
        assert_eq!(
            Journal::from_events(events).unwrap_err(),
            JournalError::IntegrityViolation { index: 0 }
        );
    }

    #[test]
    fn filters_by_item() {
        let journal = sample();
        assert_eq!(journal.events_for(WorkItemId(1)).len(), 2);
        assert!(journal.events_for(WorkItemId(2)).is_empty());
    }
}
