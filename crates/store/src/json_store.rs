//! JSON-file-backed instance store.
//!
//! The whole table lives in one schema-versioned document, rewritten
//! atomically (sibling `.tmp` + rename) after every mutation. Writers hold
//! the lock across mutate-and-persist, so same-domain races still converge
//! to one winning row on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::store::{
    apply_evict_by_status, apply_evict_unresolved, apply_insert_many, apply_upsert,
    collect_federated, InstanceStore,
};
use crate::types::{InstanceRecord, ProbeStatus};

pub const STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Deserialize)]
struct PersistedStore {
    schema_version: u32,
    #[serde(default)]
    instances: HashMap<String, InstanceRecord>,
}

#[derive(Serialize)]
struct PersistedStoreRef<'a> {
    schema_version: u32,
    instances: &'a HashMap<String, InstanceRecord>,
}

pub struct JsonInstanceStore {
    path: PathBuf,
    records: RwLock<HashMap<String, InstanceRecord>>,
}

impl JsonInstanceStore {
    /// Open the store at `path`, starting empty when the file does not exist
    /// yet. Unknown schema versions are refused rather than migrated.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let persisted: PersistedStore = serde_json::from_slice(&bytes)?;
                if persisted.schema_version != STORE_SCHEMA_VERSION {
                    return Err(StoreError::SchemaVersion {
                        found: persisted.schema_version,
                        expected: STORE_SCHEMA_VERSION,
                    });
                }
                log::info!(
                    "Loaded {} instances from {}",
                    persisted.instances.len(),
                    path.display()
                );
                persisted.instances
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Starting empty instance store at {}", path.display());
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &HashMap<String, InstanceRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(&PersistedStoreRef {
            schema_version: STORE_SCHEMA_VERSION,
            instances: records,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl InstanceStore for JsonInstanceStore {
    async fn get(&self, domain: &str) -> Result<Option<InstanceRecord>> {
        Ok(self.records.read().await.get(domain).cloned())
    }

    async fn upsert(&self, record: InstanceRecord, force: bool) -> Result<InstanceRecord> {
        let mut records = self.records.write().await;
        let (winner, changed) = apply_upsert(&mut records, record, force);
        if changed {
            self.persist(&records).await?;
        }
        Ok(winner)
    }

    async fn evict_by_status(&self, statuses: &[ProbeStatus]) -> Result<usize> {
        let mut records = self.records.write().await;
        let removed = apply_evict_by_status(&mut records, statuses);
        if removed > 0 {
            self.persist(&records).await?;
            log::info!("Evicted {removed} instances by status");
        }
        Ok(removed)
    }

    async fn evict_unresolved(&self) -> Result<usize> {
        let mut records = self.records.write().await;
        let removed = apply_evict_unresolved(&mut records);
        if removed > 0 {
            self.persist(&records).await?;
            log::info!("Evicted {removed} unresolved instances");
        }
        Ok(removed)
    }

    async fn federated(&self) -> Result<Vec<InstanceRecord>> {
        Ok(collect_federated(&*self.records.read().await))
    }

    async fn insert_many(&self, records: Vec<InstanceRecord>) -> Result<usize> {
        let mut current = self.records.write().await;
        let inserted = apply_insert_many(&mut current, records);
        if inserted > 0 {
            self.persist(&current).await?;
            log::info!("Seeded {inserted} instances");
        }
        Ok(inserted)
    }

    async fn clear(&self) -> Result<usize> {
        let mut records = self.records.write().await;
        let removed = records.len();
        records.clear();
        if removed > 0 {
            self.persist(&records).await?;
        }
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}
