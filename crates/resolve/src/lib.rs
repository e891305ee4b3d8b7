//! # Fedifinder Resolve
//!
//! Decides, for each domain a handle points at, whether it is a federation
//! node, and caches the verdict.
//!
//! ## Features
//!
//! - **Webfinger correction** - recovers the authoritative host behind a
//!   vanity domain before protocol discovery runs
//! - **Bounded discovery** - two-step NodeInfo probe with manual redirect
//!   following, capped at two hops
//! - **Cache-aware retries** - transient failures re-probe up to a ceiling,
//!   permanent ones wait for an administrative sweep
//! - **Streaming batches** - one concurrent probe task per domain, each
//!   record emitted the moment it lands in the store
//!
//! ## Architecture
//!
//! ```text
//! handles ──> group_by_domain ──> Resolver ──> mpsc stream of records
//!                                    │
//!            ┌───────────────┬──────┴────────┬────────────────┐
//!        snapshot       InstanceStore   WebfingerClient  NodeInfoClient
//!        fast path      cache + upsert  host correction  2-step probe
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fedifinder_extract::extract_handles;
//! use fedifinder_resolve::{group_by_domain, Resolver, ResolverConfig};
//! use fedifinder_store::MemoryInstanceStore;
//!
//! # async fn run() -> fedifinder_resolve::Result<()> {
//! let store = Arc::new(MemoryInstanceStore::new());
//! let resolver = Resolver::new(store, ResolverConfig::default())?;
//!
//! let handles = extract_handles("find me at @luca@vis.social");
//! let mut results = resolver.resolve_batch(group_by_domain(handles));
//! while let Some(record) = results.recv().await {
//!     println!("{}: federated = {:?}", record.domain, record.part_of_fediverse);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod nodeinfo;
mod resolver;
mod seed;
mod webfinger;

pub use config::{
    ClientConfig, ResolverConfig, DEFAULT_MAX_CONCURRENCY, DEFAULT_RETRY_CEILING, DEFAULT_TIMEOUT,
};
pub use error::{ResolveError, Result};
pub use nodeinfo::{
    LinkDiscovery, NodeInfoClient, NodeInfoDocument, WellKnownOutcome, MAX_REDIRECT_HOPS,
};
pub use resolver::{group_by_domain, CandidateDomain, Resolver};
pub use seed::{fetch_records, fetch_snapshot, import_records, refresh_from, write_snapshot};
pub use webfinger::WebfingerClient;
