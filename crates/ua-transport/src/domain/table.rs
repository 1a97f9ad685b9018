//! Request Table - the registry of in-flight requests.
//!
//! Removal is the linearization point for completion: whoever gets the entry
//! out of the table owns the right to fill its result.

use crate::domain::pending::PendingRequest;
use crate::domain::request_id::RequestId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Concurrent map from [`RequestId`] to [`PendingRequest`].
pub struct RequestTable<Req, Resp> {
    entries: DashMap<RequestId, Arc<PendingRequest<Req, Resp>>>,
}

impl<Req, Resp> Default for RequestTable<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp> RequestTable<Req, Resp> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register a request. Returns `false` (and leaves the table unchanged)
    /// if the id is already present.
    pub fn insert(&self, pending: Arc<PendingRequest<Req, Resp>>) -> bool {
        match self.entries.entry(pending.id()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(pending);
                true
            }
        }
    }

    /// Atomically remove and return the entry for `id`.
    pub fn remove_if_present(&self, id: RequestId) -> Option<Arc<PendingRequest<Req, Resp>>> {
        self.entries.remove(&id).map(|(_, pending)| pending)
    }

    /// Point-in-time copy of every entry. Holds no lock once returned.
    pub fn snapshot_values(&self) -> Vec<Arc<PendingRequest<Req, Resp>>> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn get(&self, id: RequestId) -> Option<Arc<PendingRequest<Req, Resp>>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Smallest deadline across a snapshot of the table.
    pub fn earliest_deadline(&self) -> Option<Instant> {
        self.snapshot_values()
            .iter()
            .filter_map(|pending| pending.deadline())
            .min()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ProbeRequest, ProbeResponse};
    use std::time::Duration;

    fn entry(id: u64, hint_ms: u32) -> Arc<PendingRequest<ProbeRequest, ProbeResponse>> {
        Arc::new(PendingRequest::create(
            RequestId::from(id),
            ProbeRequest::new(1).with_hint(hint_ms),
            Duration::ZERO,
            None,
        ))
    }

    #[tokio::test]
    async fn test_insert_and_remove_once() {
        let table = RequestTable::new();
        let first = entry(1, 100);

        assert!(table.insert(Arc::clone(&first)));
        assert!(!table.insert(entry(1, 200)));
        assert_eq!(table.len(), 1);

        let removed = table.remove_if_present(RequestId::from(1)).expect("present");
        assert!(Arc::ptr_eq(&removed, &first));
        assert!(table.remove_if_present(RequestId::from(1)).is_none());
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_earliest_deadline_ignores_entries_without_one() {
        let table = RequestTable::new();
        assert_eq!(table.earliest_deadline(), None);

        table.insert(entry(1, 0));
        assert_eq!(table.earliest_deadline(), None);

        let late = entry(2, 500);
        let early = entry(3, 50);
        table.insert(Arc::clone(&late));
        table.insert(Arc::clone(&early));
        assert_eq!(table.earliest_deadline(), early.deadline());

        table.remove_if_present(early.id());
        assert_eq!(table.earliest_deadline(), late.deadline());
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let table = RequestTable::new();
        for id in 0..10 {
            table.insert(entry(id, 100));
        }

        let snapshot = table.snapshot_values();
        // Mutating while holding a snapshot must neither deadlock nor change it.
        for pending in &snapshot {
            table.remove_if_present(pending.id());
            table.insert(entry(pending.id().as_u64() + 100, 100));
        }

        assert_eq!(snapshot.len(), 10);
        assert_eq!(table.len(), 10);
        assert!(table.contains(RequestId::from(105)));
    }

    #[tokio::test]
    async fn test_concurrent_removal_has_single_winner() {
        let table = Arc::new(RequestTable::new());
        let pending = entry(7, 100);
        table.insert(pending);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let table = Arc::clone(&table);
                tokio::spawn(async move { table.remove_if_present(RequestId::from(7)).is_some() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
