//! # Fedifinder Extract
//!
//! Turns free-form profile text into canonical fediverse handles.
//!
//! ## Features
//!
//! - **Unicode cleanup** - scrubbing, case folding and NFKD decomposition
//!   so styled and fullwidth text still matches
//! - **Ordered matchers** - explicit `@name@host`, bare `name@host` and
//!   profile-URL shapes, first match wins
//! - **False-positive tables** - versioned, serde-loadable blocklist of
//!   mail providers, link hubs and non-federation platforms
//! - **URL-to-handle transform** - account extraction for the common
//!   federated software path conventions
//!
//! ## Architecture
//!
//! ```text
//! text blob
//!     │
//!     ├──> Normalizer (scrub + fold + split)
//!     │      └─> tokens
//!     │
//!     ├──> Classifier (blocklist, ordered matchers)
//!     │      └─> canonical handles
//!     │
//!     └──> URL-to-handle transform
//!            └─> @name@host
//! ```
//!
//! ## Example
//!
//! ```
//! use fedifinder_extract::extract_handles;
//!
//! let handles = extract_handles("find me at @luca@vis.social");
//! assert_eq!(handles[0].as_str(), "@luca@vis.social");
//! ```

mod classify;
mod error;
mod handle;
mod normalize;
mod profile_url;
mod tables;

pub use classify::{extract_handles, extract_handles_from_fields, Classifier, TokenClass};
pub use error::{ExtractError, Result};
pub use handle::{parse_domain, Handle, SourceFields};
pub use normalize::{fold, scan_tokens};
pub use profile_url::handle_from_url;
pub use tables::{ClassifierTables, TABLES_SCHEMA_VERSION};
