//! False-positive tables for the classifier.
//!
//! Blocklist membership is a content decision that changes independently of
//! the matcher grammar, so the tables are a versioned, serde-loadable value
//! instead of hard-coded literals. [`ClassifierTables::builtin`] ships the
//! battle-tested default set.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

pub const TABLES_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierTables {
    pub schema_version: u32,
    /// Regex fragments matched anywhere in a token. A hit drops the token
    /// before any handle matcher sees it.
    pub blocklist: Vec<String>,
    /// Literal markers of contact-style addresses (`mail@`, `press@`, ...).
    /// Matched anywhere in a token, same precedence as the blocklist.
    pub contact_prefixes: Vec<String>,
}

impl ClassifierTables {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            schema_version: TABLES_SCHEMA_VERSION,
            blocklist: BUILTIN_BLOCKLIST.iter().map(|s| (*s).to_owned()).collect(),
            contact_prefixes: BUILTIN_CONTACT_PREFIXES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
        }
    }

    /// Load tables from their JSON form, rejecting unknown schema versions.
    pub fn from_json(json: &str) -> Result<Self> {
        let tables: Self = serde_json::from_str(json)?;
        if tables.schema_version != TABLES_SCHEMA_VERSION {
            return Err(ExtractError::InvalidTables(format!(
                "unsupported schema version {} (expected {})",
                tables.schema_version, TABLES_SCHEMA_VERSION
            )));
        }
        Ok(tables)
    }

    /// Compile both tables into a single alternation. `None` when the tables
    /// are empty; an empty pattern would match every token.
    pub(crate) fn compile(&self) -> Result<Option<Regex>> {
        let mut parts: Vec<String> = self
            .blocklist
            .iter()
            .filter(|fragment| !fragment.is_empty())
            .cloned()
            .collect();
        parts.extend(
            self.contact_prefixes
                .iter()
                .filter(|prefix| !prefix.is_empty())
                .map(|prefix| regex::escape(prefix)),
        );
        if parts.is_empty() {
            return Ok(None);
        }
        Regex::new(&parts.join("|"))
            .map(Some)
            .map_err(|e| ExtractError::InvalidTables(e.to_string()))
    }
}

impl Default for ClassifierTables {
    fn default() -> Self {
        Self::builtin()
    }
}

// Domains and site fragments that show up in profile text without ever being
// federation handles: mail providers, URL shorteners, link hubs and the big
// non-federation platforms. Entries are regex fragments; `(?:$|/)` pins a
// domain to the end of the host part so path forms are caught too.
const BUILTIN_BLOCKLIST: &[&str] = &[
    r"gmail\.com(?:$|/)",
    "mixcloud",
    r"linktr\.ee(?:$|/)",
    "pinboard",
    r"xing\.com(?:$|/)",
    "researchgate",
    "about",
    r"bit\.ly(?:$|/)",
    "imprint",
    "impressum",
    "patreon",
    "donate",
    "blog",
    "facebook",
    "news",
    "github",
    "instagram",
    r"t\.me(?:$|/)",
    r"medium\.com(?:$|/)",
    r"t\.co(?:$|/)",
    r"tiktok\.com(?:$|/)",
    r"youtube\.com(?:$|/)",
    r"pronouns\.page(?:$|/)",
    "observablehq",
    r"twitter\.com(?:$|/)",
    "protonmail",
    r"traewelling\.de(?:$|/)",
    "pobox",
    r"hey\.com(?:$|/)",
];

const BUILTIN_CONTACT_PREFIXES: &[&str] =
    &["mail@", "contact@", "kontakt@", "press@", "support@", "info@"];
