//! The known-instances snapshot.
//!
//! A periodically regenerated, read-only projection of every federated
//! record, keyed by domain. The orchestrator uses it as a fast path that
//! spares the network and the store; deployments exchange it as a plain
//! JSON map, which is also the published interchange format, so the file
//! carries no schema envelope.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{InstanceRecord, KnownInstance};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownInstances {
    #[serde(flatten)]
    instances: HashMap<String, KnownInstance>,
}

impl KnownInstances {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Project federated records into a snapshot. Non-federated and
    /// unresolved records never appear in it.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a InstanceRecord>) -> Self {
        let instances = records
            .into_iter()
            .filter(|record| record.is_federated())
            .map(|record| (record.domain.clone(), KnownInstance::from_record(record)))
            .collect();
        Self { instances }
    }

    #[must_use]
    pub fn get(&self, domain: &str) -> Option<&KnownInstance> {
        self.instances.get(domain)
    }

    #[must_use]
    pub fn contains(&self, domain: &str) -> bool {
        self.instances.contains_key(domain)
    }

    pub fn insert(&mut self, domain: String, instance: KnownInstance) {
        self.instances.insert(domain, instance);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let snapshot: Self = serde_json::from_slice(&bytes)?;
        log::info!(
            "Loaded {} known instances from {}",
            snapshot.len(),
            path.as_ref().display()
        );
        Ok(snapshot)
    }

    pub async fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        log::info!("Wrote {} known instances to {}", self.len(), path.display());
        Ok(())
    }
}
