//! Batch resolution orchestrator: snapshot fast path, cache-aware retry
//! policy, webfinger correction, and concurrent per-domain probes.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fedifinder_extract::Handle;
use fedifinder_store::{InstanceRecord, InstanceStore, KnownInstances};
use tokio::sync::{mpsc, Semaphore};

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::nodeinfo::{url_authority, LinkDiscovery, NodeInfoClient};
use crate::webfinger::WebfingerClient;

/// One domain to resolve plus the handles that pointed at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDomain {
    pub domain: String,
    pub handles: Vec<Handle>,
}

impl CandidateDomain {
    /// A candidate without any backing handle (seed sweeps, direct checks).
    #[must_use]
    pub fn bare(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            handles: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            domain: handle.domain().to_owned(),
            handles: vec![handle],
        }
    }

    /// The handle used for the webfinger lookup.
    fn sample_handle(&self) -> Option<&Handle> {
        self.handles.first()
    }
}

/// Group handles by their embedded domain, preserving first-seen order.
#[must_use]
pub fn group_by_domain(handles: Vec<Handle>) -> Vec<CandidateDomain> {
    let mut grouped: Vec<CandidateDomain> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        match index.entry(handle.domain().to_owned()) {
            Entry::Occupied(entry) => grouped[*entry.get()].handles.push(handle),
            Entry::Vacant(entry) => {
                entry.insert(grouped.len());
                grouped.push(CandidateDomain::with_handle(handle));
            }
        }
    }
    grouped
}

/// Resolves domains to instance records, one store row per domain.
///
/// Per domain, in order: known-instances snapshot (no network, no store
/// write), cached record (returned unchanged unless it is a transient
/// failure below the retry ceiling), fresh probe followed by a single
/// `upsert`.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn InstanceStore>,
    webfinger: WebfingerClient,
    nodeinfo: NodeInfoClient,
    snapshot: Option<Arc<KnownInstances>>,
    config: ResolverConfig,
    limit: Arc<Semaphore>,
}

impl Resolver {
    pub fn new(store: Arc<dyn InstanceStore>, config: ResolverConfig) -> Result<Self> {
        let webfinger = WebfingerClient::new(&config.client)?;
        let nodeinfo = NodeInfoClient::new(&config.client)?;
        let limit = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Ok(Self {
            store,
            webfinger,
            nodeinfo,
            snapshot: None,
            config,
            limit,
        })
    }

    /// Attach a known-instances snapshot consulted before cache and network.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: KnownInstances) -> Self {
        self.snapshot = Some(Arc::new(snapshot));
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a batch, streaming each record as it completes.
    ///
    /// Emits exactly one record per distinct input domain, in completion
    /// order. One failing domain never takes the batch down. Dropping the
    /// receiver abandons the remaining emissions; every in-flight probe
    /// still finishes its single store write first.
    pub fn resolve_batch(&self, batch: Vec<CandidateDomain>) -> mpsc::Receiver<InstanceRecord> {
        let mut seen = HashSet::new();
        let batch: Vec<CandidateDomain> = batch
            .into_iter()
            .filter(|candidate| seen.insert(candidate.domain.clone()))
            .collect();
        let (tx, rx) = mpsc::channel(batch.len().max(1));
        log::info!("Resolving {} distinct domains", batch.len());
        for candidate in batch {
            let resolver = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                // The semaphore is never closed; acquire failures are not
                // expected.
                let _permit = resolver
                    .limit
                    .clone()
                    .acquire_owned()
                    .await
                    .unwrap_or_else(|_| unreachable!("probe semaphore closed"));
                let record = resolver.resolve_domain(candidate).await;
                let _ = tx.send(record).await;
            });
        }
        rx
    }

    /// Re-probe one domain immediately, replacing any cached record.
    ///
    /// Bypasses the snapshot and the cache freshness check; an existing row
    /// counts as a prior attempt and bumps `retries`.
    pub async fn force_refresh(
        &self,
        domain: &str,
        handle: Option<&Handle>,
    ) -> Result<InstanceRecord> {
        let prior = self.store.get(domain).await?;
        let mut record = self.probe(domain, handle).await;
        if let Some(prior) = prior {
            record.retries = prior.retries + 1;
        }
        Ok(self.store.upsert(record, true).await?)
    }

    async fn resolve_domain(&self, candidate: CandidateDomain) -> InstanceRecord {
        let domain = candidate.domain.as_str();

        if let Some(snapshot) = &self.snapshot {
            if let Some(known) = snapshot.get(domain) {
                log::debug!("{domain}: in the known-instances snapshot");
                return known.to_record(domain);
            }
        }

        let cached = match self.store.get(domain).await {
            Ok(cached) => cached,
            Err(err) => {
                log::error!("{domain}: store read failed: {err}");
                None
            }
        };
        let prior_retries = match cached {
            Some(record) if !record.retry_eligible(self.config.retry_ceiling) => {
                log::debug!("{domain}: cached");
                return record;
            }
            Some(record) => {
                log::debug!(
                    "{domain}: cached transient failure, re-attempt {}",
                    record.retries + 1
                );
                Some(record.retries)
            }
            None => None,
        };

        let mut record = self.probe(domain, candidate.sample_handle()).await;
        let force = prior_retries.is_some();
        if let Some(prior) = prior_retries {
            record.retries = prior + 1;
        }
        self.commit(record, force).await
    }

    /// Webfinger first when a handle is available, then discovery against
    /// the corrected host, falling back to the embedded domain when the
    /// corrected host yields no link document.
    async fn probe(&self, domain: &str, handle: Option<&Handle>) -> InstanceRecord {
        let located = match handle {
            Some(handle) => self.webfinger.locate_at(domain, handle).await,
            None => None,
        };
        let corrected = located
            .as_ref()
            .and_then(url_authority)
            .filter(|host| host != domain);

        if let Some(host) = corrected {
            if let LinkDiscovery::Found(href) = self.nodeinfo.locate_links(&host).await {
                let mut record = self.nodeinfo.probe_links(domain, &href).await;
                record.local_domain = Some(host);
                return record;
            }
            log::debug!("{domain}: no link document at {host}, falling back");
        }
        self.nodeinfo.probe(domain).await
    }

    /// The task's single store write. A write failure downgrades to a
    /// logged error so the batch still emits the probed record.
    async fn commit(&self, record: InstanceRecord, force: bool) -> InstanceRecord {
        match self.store.upsert(record.clone(), force).await {
            Ok(winner) => winner,
            Err(err) => {
                log::error!("{}: store write failed: {err}", record.domain);
                record
            }
        }
    }
}
