//! Authoritative in-memory collection of work items
//!
//! Items live in an id-ordered map behind one `RwLock`; ids come from an
//! atomic counter owned by the store. The store applies mutations but does
//! not judge them: workflow legality is the workflow engine's job.

use crate::config::EffortPolicy;
use crate::error::{BacklogError, BacklogResult};
use backlog_model::{Effort, NewWorkItem, WorkItem, WorkItemId, WorkItemStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Work item collection keyed by id
#[derive(Debug)]
pub struct WorkItemStore {
    items: RwLock<BTreeMap<WorkItemId, WorkItem>>,
    next_id: AtomicU64,
}

impl WorkItemStore {
    /// Create an empty store; the first id handed out is 1
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Rebuild a store from previously persisted items
    ///
    /// `next_id` is raised past the largest stored id if needed.
    ///
    /// # Errors
    /// Returns [`BacklogError::Validation`] for duplicate ids or items that
    /// break a model invariant
    pub fn from_items(items: Vec<WorkItem>, next_id: u64) -> BacklogResult<Self> {
        let mut map = BTreeMap::new();
        for item in items {
            item.check_invariants()
                .map_err(|v| BacklogError::Validation(format!("item {}: {v}", item.id)))?;
            let id = item.id;
            if map.insert(id, item).is_some() {
                return Err(BacklogError::Validation(format!("duplicate item id {id}")));
            }
        }
        let floor = map.keys().next_back().map_or(1, |id| id.get() + 1);
        Ok(Self {
            items: RwLock::new(map),
            next_id: AtomicU64::new(next_id.max(floor)),
        })
    }

    /// Store a new item in BACKLOG
    ///
    /// # Errors
    /// - [`BacklogError::Validation`] for a blank title
    /// - [`BacklogError::InvalidEffort`] for off-scale effort under
    ///   [`EffortPolicy::Strict`]
    pub fn create(&self, fields: NewWorkItem, policy: EffortPolicy) -> BacklogResult<WorkItem> {
        self.create_observed(fields, policy, |_| {})
    }

    /// As [`WorkItemStore::create`], calling `observe` with the new item
    /// before the write lock is released
    ///
    /// # Errors
    /// See [`WorkItemStore::create`]
    pub fn create_observed<F>(
        &self,
        fields: NewWorkItem,
        policy: EffortPolicy,
        observe: F,
    ) -> BacklogResult<WorkItem>
    where
        F: FnOnce(&WorkItem),
    {
        fields.validate()?;
        let effort = match policy {
            EffortPolicy::Strict => Effort::new(fields.effort)?,
            EffortPolicy::Snap => Effort::normalize(fields.effort),
        };

        let mut items = self.items.write();
        // allocated under the lock so id order is insertion order
        let id = WorkItemId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let item = WorkItem::new(id, fields, effort, Utc::now());
        items.insert(id, item.clone());
        observe(&item);
        Ok(item)
    }

    /// Fetch one item
    ///
    /// # Errors
    /// Returns [`BacklogError::NotFound`] for an unknown id
    pub fn get(&self, id: WorkItemId) -> BacklogResult<WorkItem> {
        self.items
            .read()
            .get(&id)
            .cloned()
            .ok_or(BacklogError::NotFound(id))
    }

    /// All items in insertion (id) order
    #[must_use]
    pub fn list_all(&self) -> Vec<WorkItem> {
        self.items.read().values().cloned().collect()
    }

    /// Items committed to iteration `n`
    #[must_use]
    pub fn list_by_iteration(&self, n: u32) -> Vec<WorkItem> {
        self.filter(|item| item.iteration == Some(n))
    }

    /// Items currently in `status`
    #[must_use]
    pub fn list_by_status(&self, status: WorkItemStatus) -> Vec<WorkItem> {
        self.filter(|item| item.status == status)
    }

    /// Items matching an arbitrary predicate, in id order
    pub fn filter<P>(&self, predicate: P) -> Vec<WorkItem>
    where
        P: Fn(&WorkItem) -> bool,
    {
        self.items
            .read()
            .values()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    /// Number of stored items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// True when no item has been stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Id the next `create` will hand out
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Apply an infallible mutation and refresh `updated_at`
    ///
    /// # Errors
    /// Returns [`BacklogError::NotFound`] for an unknown id
    pub fn update<F>(&self, id: WorkItemId, mutator: F) -> BacklogResult<WorkItem>
    where
        F: FnOnce(&mut WorkItem),
    {
        self.try_update(id, |item| {
            mutator(item);
            Ok(())
        })
    }

    /// Apply a fallible mutation under the write lock
    ///
    /// The mutator works on a copy; the stored item is replaced only when it
    /// returns `Ok`, so a rejected mutation leaves no partial change behind.
    ///
    /// # Errors
    /// Returns [`BacklogError::NotFound`] for an unknown id, or whatever the
    /// mutator returns
    pub fn try_update<F>(&self, id: WorkItemId, mutator: F) -> BacklogResult<WorkItem>
    where
        F: FnOnce(&mut WorkItem) -> BacklogResult<()>,
    {
        let mut items = self.items.write();
        let stored = items.get_mut(&id).ok_or(BacklogError::NotFound(id))?;

        let mut draft = stored.clone();
        mutator(&mut draft)?;
        draft.id = id;
        draft.updated_at = Utc::now();
        *stored = draft.clone();
        Ok(draft)
    }

    /// Run `f` with exclusive access to every item
    ///
    /// Used where a read-then-write over many items must not interleave with
    /// other mutations, such as committing a planning selection.
    pub fn transaction<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut StoreTransaction<'_>) -> R,
    {
        let mut items = self.items.write();
        let mut txn = StoreTransaction {
            items: &mut *items,
            now: Utc::now(),
        };
        f(&mut txn)
    }
}

impl Default for WorkItemStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive view over the store for the duration of a transaction
#[derive(Debug)]
pub struct StoreTransaction<'a> {
    items: &'a mut BTreeMap<WorkItemId, WorkItem>,
    now: DateTime<Utc>,
}

impl StoreTransaction<'_> {
    /// Items in id order
    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.values()
    }

    /// Timestamp applied to every mutation in this transaction
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Mutate one item and stamp `updated_at`; `None` for an unknown id
    pub fn modify<F>(&mut self, id: WorkItemId, mutator: F) -> Option<WorkItem>
    where
        F: FnOnce(&mut WorkItem),
    {
        let item = self.items.get_mut(&id)?;
        mutator(item);
        item.id = id;
        item.updated_at = self.now;
        Some(item.clone())
    }
}
