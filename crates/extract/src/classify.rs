//! Ordered matcher rules turning tokens into handles.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::handle::{self, Handle, SourceFields};
use crate::normalize;
use crate::profile_url::handle_from_url;
use crate::tables::ClassifierTables;

/// What the ordered matcher list decided about one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    /// Token already in canonical `@name@host` form.
    CanonicalHandle,
    /// Handle missing its leading `@`.
    BareHandle,
    /// Profile URL convertible through the URL-to-handle transform.
    ProfileUrl,
    /// Matched the false-positive tables; dropped before shape matching.
    Blocked,
    /// No rule matched; the token is discarded, never guessed at.
    Unrecognized,
}

/// Token classifier over a compiled table set.
///
/// Matcher order is part of the contract: the blocklist runs first, then the
/// handle shapes from most to least explicit. Classification is a pure
/// function of the token.
pub struct Classifier {
    tables: ClassifierTables,
    blocked: Option<Regex>,
}

impl Classifier {
    pub fn new(tables: ClassifierTables) -> Result<Self> {
        let blocked = tables.compile()?;
        Ok(Self { tables, blocked })
    }

    /// The process-wide classifier over [`ClassifierTables::builtin`].
    #[must_use]
    pub fn builtin() -> &'static Classifier {
        static BUILTIN: Lazy<Classifier> = Lazy::new(|| {
            Classifier::new(ClassifierTables::builtin()).expect("builtin tables compile")
        });
        &BUILTIN
    }

    #[must_use]
    pub fn tables(&self) -> &ClassifierTables {
        &self.tables
    }

    /// Run the ordered matcher list over one trimmed token. First match wins;
    /// the false-positive tables outrank every shape matcher.
    #[must_use]
    pub fn classify_token(&self, token: &str) -> TokenClass {
        if let Some(blocked) = &self.blocked {
            if blocked.is_match(token) {
                return TokenClass::Blocked;
            }
        }
        if handle::is_canonical(token) {
            return TokenClass::CanonicalHandle;
        }
        if handle::is_bare_handle(token) {
            return TokenClass::BareHandle;
        }
        if PROFILE.is_match(token) {
            return TokenClass::ProfileUrl;
        }
        TokenClass::Unrecognized
    }

    /// Classify one token and build its handle, if any.
    #[must_use]
    pub fn handle_for(&self, token: &str) -> Option<Handle> {
        match self.classify_token(token) {
            TokenClass::CanonicalHandle => Handle::from_scan(token, token),
            TokenClass::BareHandle => Handle::from_scan(&format!("@{token}"), token),
            TokenClass::ProfileUrl => handle_from_url(token),
            TokenClass::Blocked | TokenClass::Unrecognized => None,
        }
    }

    /// Scan a text blob into a deduplicated handle list.
    ///
    /// Duplicates are keyed on the canonical form; a later occurrence
    /// replaces the earlier one in place, so the first appearance keeps its
    /// position while the freshest source token wins.
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<Handle> {
        let mut handles: Vec<Handle> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for raw in normalize::scan_tokens(text) {
            let token = trim_edges(&raw);
            if token.is_empty() {
                continue;
            }
            let Some(found) = self.handle_for(token) else {
                continue;
            };
            match index.entry(found.as_str().to_owned()) {
                Entry::Occupied(entry) => handles[*entry.get()] = found,
                Entry::Vacant(entry) => {
                    entry.insert(handles.len());
                    handles.push(found);
                }
            }
        }
        handles
    }
}

/// Scan a text blob with the builtin tables.
///
/// Pure and deterministic: the same text always yields the same handle list,
/// independent of prior calls.
#[must_use]
pub fn extract_handles(text: &str) -> Vec<Handle> {
    Classifier::builtin().scan(text)
}

/// Scan one contact's flattened profile fields with the builtin tables.
///
/// The present fields are joined into a single blob, so a handle repeated
/// across bio and pinned text comes back once.
#[must_use]
pub fn extract_handles_from_fields(fields: &SourceFields) -> Vec<Handle> {
    extract_handles(&fields.scan_text())
}

/// Strip stray sentence punctuation from token edges so a handle embedded in
/// prose is still recognized.
fn trim_edges(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, ':' | '/' | '.' | ','))
}

// Profile-URL shape: a dotted host followed by one of the path conventions
// federated software uses for accounts, with or without scheme.
static PROFILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.+\.[a-z]+.*/(?:@|web/|profile/|u/|c/)[a-z0-9_]+/*$")
        .expect("valid profile pattern")
});
