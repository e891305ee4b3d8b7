//! Canonical `@name@host` handles and the boundary grammars guarding them.

use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};
use crate::normalize;

/// A canonical fediverse handle.
///
/// The canonical form is lowercased, NFKD-folded, starts with `@` and has
/// exactly two `@`-delimited segments with a dotted host. Instances are only
/// built through validated paths ([`Handle::parse`] at API boundaries, the
/// classifier during scans), so every `Handle` in the system upholds that
/// shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Handle {
    canonical: String,
    source: String,
}

impl Handle {
    /// Validate and canonicalize caller-supplied input (query parameters,
    /// CLI arguments). The leading `@` is optional on input.
    pub fn parse(input: &str) -> Result<Self> {
        let folded = normalize::fold(input.trim());
        let bare = folded.strip_prefix('@').unwrap_or(&folded);
        let canonical = format!("@{bare}");
        if !CANONICAL.is_match(&canonical) {
            return Err(ExtractError::InvalidHandle(input.to_owned()));
        }
        Ok(Self {
            canonical,
            source: input.to_owned(),
        })
    }

    /// Build a handle from an already-folded scan token. `None` when the
    /// candidate does not satisfy the canonical grammar.
    pub(crate) fn from_scan(candidate: &str, source: &str) -> Option<Self> {
        if !CANONICAL.is_match(candidate) {
            return None;
        }
        Some(Self {
            canonical: candidate.to_owned(),
            source: source.to_owned(),
        })
    }

    /// The canonical `@name@host` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// `name@host` without the leading `@`, the form webfinger's `acct:`
    /// resource expects.
    #[must_use]
    pub fn acct(&self) -> &str {
        &self.canonical[1..]
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.acct().split_once('@').map(|(name, _)| name).unwrap_or("")
    }

    /// The domain embedded in the handle. The authoritative host may differ;
    /// see the resolver's `local_domain` handling.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.acct()
            .split_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or("")
    }

    /// The raw token this handle was recognized from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Profile URL on the serving host, preferring the authoritative
    /// `local_domain` when one is known.
    #[must_use]
    pub fn profile_url(&self, local_domain: Option<&str>) -> String {
        let host = local_domain.unwrap_or_else(|| self.domain());
        format!("https://{host}/@{}", self.name())
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.canonical
    }
}

impl TryFrom<String> for Handle {
    type Error = ExtractError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

/// Validate and canonicalize a bare domain argument.
pub fn parse_domain(input: &str) -> Result<String> {
    let folded = normalize::fold(input.trim());
    if !DOMAIN.is_match(&folded) {
        return Err(ExtractError::InvalidDomain(input.to_owned()));
    }
    Ok(folded)
}

pub(crate) fn is_canonical(token: &str) -> bool {
    CANONICAL.is_match(token)
}

pub(crate) fn is_bare_handle(token: &str) -> bool {
    BARE.is_match(token)
}

/// The flattened free-text fields of one contact, as supplied by the
/// profile-scanning layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

impl SourceFields {
    /// Join the present fields into one scannable blob. Absent fields are
    /// skipped, never rendered as placeholder text.
    #[must_use]
    pub fn scan_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for field in [
            &self.display_name,
            &self.description,
            &self.location,
            &self.pinned_text,
        ] {
            if let Some(text) = field {
                parts.push(text);
            }
        }
        for url in &self.urls {
            parts.push(url);
        }
        parts.join(" ")
    }
}

static CANONICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@[a-z0-9_]+@[a-z0-9.-]+\.[a-z]+$").expect("valid handle pattern"));

static BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]+@[a-z0-9.-]+\.[a-z]+$").expect("valid handle pattern"));

static DOMAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9.-]+\.[a-z]+$").expect("valid domain pattern"));
