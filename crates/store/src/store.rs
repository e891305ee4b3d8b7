//! The instance store seam.
//!
//! Resolution code only ever sees `Arc<dyn InstanceStore>`; the JSON-backed
//! implementation lives in [`crate::json_store`], and [`MemoryInstanceStore`]
//! backs tests and ephemeral runs.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::{InstanceRecord, ProbeStatus};

/// Key-value table over `domain`, the single source of truth for
/// "is this host a federation node".
///
/// `upsert` is the only mutation path for individual records; there are no
/// field-level updates. Implementations must serialize writes so concurrent
/// upserts for one domain converge to a single row.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn get(&self, domain: &str) -> Result<Option<InstanceRecord>>;

    /// Insert or replace one record.
    ///
    /// Absent: insert and return the new record. Present without `force`:
    /// keep and return the stored record (first writer wins, so a flood of
    /// concurrent first-time resolutions cannot fight over a row). Present
    /// with `force`: replace wholesale and return the new record.
    async fn upsert(&self, record: InstanceRecord, force: bool) -> Result<InstanceRecord>;

    /// Delete every record whose status is in `statuses`. Returns the number
    /// of records removed.
    async fn evict_by_status(&self, statuses: &[ProbeStatus]) -> Result<usize>;

    /// Delete every record without a federation verdict, clearing the way
    /// for a fresh attempt. Confirmed-negative records are kept.
    async fn evict_unresolved(&self) -> Result<usize>;

    /// All federated records, sorted by domain.
    async fn federated(&self) -> Result<Vec<InstanceRecord>>;

    /// Bulk seed. Existing rows win; returns the number actually inserted.
    async fn insert_many(&self, records: Vec<InstanceRecord>) -> Result<usize>;

    /// Drop every record. Returns the number removed.
    async fn clear(&self) -> Result<usize>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Upsert against a plain map; shared by the store implementations.
/// Returns the winning record and whether the map changed.
pub(crate) fn apply_upsert(
    records: &mut HashMap<String, InstanceRecord>,
    record: InstanceRecord,
    force: bool,
) -> (InstanceRecord, bool) {
    match records.entry(record.domain.clone()) {
        Entry::Occupied(mut entry) => {
            if force {
                entry.insert(record.clone());
                (record, true)
            } else {
                (entry.get().clone(), false)
            }
        }
        Entry::Vacant(entry) => {
            entry.insert(record.clone());
            (record, true)
        }
    }
}

pub(crate) fn apply_evict_by_status(
    records: &mut HashMap<String, InstanceRecord>,
    statuses: &[ProbeStatus],
) -> usize {
    let before = records.len();
    records.retain(|_, record| {
        record
            .status
            .map_or(true, |status| !statuses.contains(&status))
    });
    before - records.len()
}

pub(crate) fn apply_evict_unresolved(records: &mut HashMap<String, InstanceRecord>) -> usize {
    let before = records.len();
    records.retain(|_, record| record.part_of_fediverse.is_some());
    before - records.len()
}

pub(crate) fn apply_insert_many(
    records: &mut HashMap<String, InstanceRecord>,
    incoming: Vec<InstanceRecord>,
) -> usize {
    let mut inserted = 0;
    for record in incoming {
        if let Entry::Vacant(entry) = records.entry(record.domain.clone()) {
            entry.insert(record);
            inserted += 1;
        }
    }
    inserted
}

pub(crate) fn collect_federated(records: &HashMap<String, InstanceRecord>) -> Vec<InstanceRecord> {
    let mut federated: Vec<InstanceRecord> = records
        .values()
        .filter(|record| record.is_federated())
        .cloned()
        .collect();
    federated.sort_by(|a, b| a.domain.cmp(&b.domain));
    federated
}

/// In-memory store for tests and single-shot runs.
#[derive(Default)]
pub struct MemoryInstanceStore {
    records: RwLock<HashMap<String, InstanceRecord>>,
}

impl MemoryInstanceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn get(&self, domain: &str) -> Result<Option<InstanceRecord>> {
        Ok(self.records.read().await.get(domain).cloned())
    }

    async fn upsert(&self, record: InstanceRecord, force: bool) -> Result<InstanceRecord> {
        let mut records = self.records.write().await;
        let (winner, _) = apply_upsert(&mut records, record, force);
        Ok(winner)
    }

    async fn evict_by_status(&self, statuses: &[ProbeStatus]) -> Result<usize> {
        let mut records = self.records.write().await;
        Ok(apply_evict_by_status(&mut records, statuses))
    }

    async fn evict_unresolved(&self) -> Result<usize> {
        let mut records = self.records.write().await;
        Ok(apply_evict_unresolved(&mut records))
    }

    async fn federated(&self) -> Result<Vec<InstanceRecord>> {
        Ok(collect_federated(&*self.records.read().await))
    }

    async fn insert_many(&self, records: Vec<InstanceRecord>) -> Result<usize> {
        let mut current = self.records.write().await;
        Ok(apply_insert_many(&mut current, records))
    }

    async fn clear(&self) -> Result<usize> {
        let mut records = self.records.write().await;
        let removed = records.len();
        records.clear();
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn failed(domain: &str, status: ProbeStatus) -> InstanceRecord {
        InstanceRecord::not_federated(domain, status)
    }

    fn federated_record(domain: &str, software: &str) -> InstanceRecord {
        InstanceRecord {
            part_of_fediverse: Some(true),
            software_name: Some(software.to_owned()),
            ..InstanceRecord::unknown(domain)
        }
    }

    #[tokio::test]
    async fn upsert_inserts_when_absent() {
        let store = MemoryInstanceStore::new();
        let record = federated_record("vis.social", "mastodon");
        let stored = store.upsert(record.clone(), false).await.unwrap();
        assert_eq!(stored, record);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_without_force_keeps_the_existing_row() {
        let store = MemoryInstanceStore::new();
        let first = federated_record("vis.social", "mastodon");
        store.upsert(first.clone(), false).await.unwrap();

        let second = federated_record("vis.social", "pleroma");
        let winner = store.upsert(second, false).await.unwrap();
        assert_eq!(winner, first);
        assert_eq!(store.get("vis.social").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn upsert_with_force_replaces_wholesale() {
        let store = MemoryInstanceStore::new();
        store
            .upsert(federated_record("test.com", "mastodon"), false)
            .await
            .unwrap();

        let replacement = failed("test.com", ProbeStatus::Http(500));
        let winner = store.upsert(replacement.clone(), true).await.unwrap();
        assert_eq!(winner, replacement);
        assert_eq!(store.get("test.com").await.unwrap(), Some(replacement));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_upserts_converge_to_one_row() {
        let store = std::sync::Arc::new(MemoryInstanceStore::new());
        let mut joins = Vec::new();
        for attempt in 0..16u32 {
            let store = store.clone();
            joins.push(tokio::spawn(async move {
                let mut record = federated_record("vis.social", "mastodon");
                record.retries = attempt;
                store.upsert(record, false).await.unwrap()
            }));
        }
        for join in joins {
            join.await.unwrap();
        }
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn evict_by_status_removes_matching_rows_only() {
        let store = MemoryInstanceStore::new();
        store
            .upsert(failed("a.example", ProbeStatus::Http(404)), false)
            .await
            .unwrap();
        store
            .upsert(failed("b.example", ProbeStatus::Timeout), false)
            .await
            .unwrap();
        store
            .upsert(federated_record("vis.social", "mastodon"), false)
            .await
            .unwrap();

        let removed = store
            .evict_by_status(&[ProbeStatus::Http(404)])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.get("a.example").await.unwrap(), None);
        assert!(store.get("b.example").await.unwrap().is_some());
        assert!(store.get("vis.social").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn evict_unresolved_keeps_confirmed_negatives() {
        let store = MemoryInstanceStore::new();
        store
            .upsert(
                InstanceRecord::unresolved("loopy.example", ProbeStatus::TooManyRedirects),
                false,
            )
            .await
            .unwrap();
        store
            .upsert(failed("google.com", ProbeStatus::Http(404)), false)
            .await
            .unwrap();

        let removed = store.evict_unresolved().await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.get("loopy.example").await.unwrap(), None);
        assert!(store.get("google.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn insert_many_never_overwrites() {
        let store = MemoryInstanceStore::new();
        let original = federated_record("vis.social", "mastodon");
        store.upsert(original.clone(), false).await.unwrap();

        let inserted = store
            .insert_many(vec![
                federated_record("vis.social", "pleroma"),
                federated_record("det.social", "mastodon"),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.get("vis.social").await.unwrap(), Some(original));
        assert!(store.get("det.social").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn federated_lists_only_federated_sorted_by_domain() {
        let store = MemoryInstanceStore::new();
        store
            .upsert(federated_record("det.social", "mastodon"), false)
            .await
            .unwrap();
        store
            .upsert(federated_record("botsin.space", "mastodon"), false)
            .await
            .unwrap();
        store
            .upsert(failed("google.com", ProbeStatus::Http(404)), false)
            .await
            .unwrap();

        let federated = store.federated().await.unwrap();
        let domains: Vec<&str> = federated.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, vec!["botsin.space", "det.social"]);
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let store = MemoryInstanceStore::new();
        store
            .upsert(federated_record("vis.social", "mastodon"), false)
            .await
            .unwrap();
        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(store.is_empty().await.unwrap());
    }
}
