//! Snapshot export and bulk seeding from other deployments.
//!
//! A deployment can publish its store as a JSON array of records and its
//! federated subset as the known-instances snapshot. Peers seed themselves
//! from either form instead of re-probing the whole graph.

use std::path::Path;

use fedifinder_store::{InstanceRecord, InstanceStore, KnownInstances};

use crate::config::ClientConfig;
use crate::error::{ResolveError, Result};
use crate::resolver::{CandidateDomain, Resolver};

/// Write the known-instances snapshot covering every federated record in
/// `store`. Returns the number of instances written.
pub async fn write_snapshot(store: &dyn InstanceStore, path: impl AsRef<Path>) -> Result<usize> {
    let federated = store.federated().await?;
    let snapshot = KnownInstances::from_records(&federated);
    let count = snapshot.len();
    snapshot.write(path).await?;
    Ok(count)
}

/// Download a remote store export (a JSON array of records).
pub async fn fetch_records(url: &str, config: &ClientConfig) -> Result<Vec<InstanceRecord>> {
    let bytes = fetch(url, config).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Download a remote known-instances snapshot (the domain-keyed map form).
pub async fn fetch_snapshot(url: &str, config: &ClientConfig) -> Result<KnownInstances> {
    let bytes = fetch(url, config).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Seed `store` from a remote export. Existing rows always win; seeding
/// never overwrites local resolutions.
pub async fn import_records(
    store: &dyn InstanceStore,
    url: &str,
    config: &ClientConfig,
) -> Result<usize> {
    let records = fetch_records(url, config).await?;
    let total = records.len();
    let inserted = store.insert_many(records).await?;
    log::info!("Seeded {inserted} of {total} records from {url}");
    Ok(inserted)
}

/// Fetch a remote export and run every listed domain back through the
/// resolver, picking up instances that appeared or recovered since the
/// export was taken. Returns the number of domains processed.
pub async fn refresh_from(resolver: &Resolver, url: &str) -> Result<usize> {
    let records = fetch_records(url, &resolver.config().client).await?;
    let batch: Vec<CandidateDomain> = records
        .into_iter()
        .map(|record| CandidateDomain::bare(record.domain))
        .collect();
    let mut results = resolver.resolve_batch(batch);
    let mut processed = 0usize;
    while results.recv().await.is_some() {
        processed += 1;
    }
    Ok(processed)
}

async fn fetch(url: &str, config: &ClientConfig) -> Result<Vec<u8>> {
    let client = reqwest::Client::builder().timeout(config.timeout).build()?;
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ResolveError::SeedRejected(response.status()));
    }
    Ok(response.bytes().await?.to_vec())
}
