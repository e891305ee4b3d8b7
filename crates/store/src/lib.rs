//! # Fedifinder Store
//!
//! Durable per-domain knowledge about federation membership.
//!
//! ## Features
//!
//! - **One row per domain** - upsert-only mutation with first-writer-wins
//!   and explicit force-replace semantics
//! - **Failure bookkeeping** - typed status codes and a retry counter that
//!   feed the resolver's retry policy
//! - **Eviction sweeps** - bulk removal by status set or missing verdict
//! - **Atomic persistence** - schema-versioned JSON document, written via
//!   sibling tmp file + rename
//! - **Known-instances snapshot** - read-only projection of the federated
//!   subset, exchanged between deployments
//!
//! ## Example
//!
//! ```no_run
//! use fedifinder_store::{InstanceRecord, InstanceStore, JsonInstanceStore};
//!
//! #[tokio::main]
//! async fn main() -> fedifinder_store::Result<()> {
//!     let store = JsonInstanceStore::open("instances.json").await?;
//!
//!     let record = InstanceRecord {
//!         part_of_fediverse: Some(true),
//!         software_name: Some("mastodon".to_owned()),
//!         ..InstanceRecord::unknown("vis.social")
//!     };
//!     store.upsert(record, false).await?;
//!
//!     println!("{} domains tracked", store.len().await?);
//!     Ok(())
//! }
//! ```

mod error;
mod json_store;
mod snapshot;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use json_store::{JsonInstanceStore, STORE_SCHEMA_VERSION};
pub use snapshot::KnownInstances;
pub use store::{InstanceStore, MemoryInstanceStore};
pub use types::{
    InstanceRecord, KnownInstance, ProbeStatus, PERMANENT_FAILURE_STATUSES,
    TRANSIENT_FAILURE_STATUSES,
};
