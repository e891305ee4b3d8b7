//! Webfinger lookup: recover the authoritative host behind a handle.
//!
//! Accounts often advertise a vanity domain that only aliases the instance
//! actually hosting them (`@user@example.com` served from
//! `social.example.net`). Webfinger resolves the alias so discovery can run
//! against the host that really answers.

use fedifinder_extract::Handle;
use serde::Deserialize;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Result;

/// Client for `/.well-known/webfinger` lookups.
///
/// A lookup failure of any kind degrades to `None`: a missing webfinger
/// endpoint never fails a resolution, it only skips the host correction.
#[derive(Debug, Clone)]
pub struct WebfingerClient {
    client: reqwest::Client,
    scheme: &'static str,
}

impl WebfingerClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            scheme: config.scheme(),
        })
    }

    /// Look up `handle` at its own embedded domain.
    pub async fn locate(&self, handle: &Handle) -> Option<Url> {
        self.locate_at(handle.domain(), handle).await
    }

    /// Look up `handle` at an explicit host and return the first advertised
    /// profile link.
    pub async fn locate_at(&self, host: &str, handle: &Handle) -> Option<Url> {
        let url = format!(
            "{scheme}://{host}/.well-known/webfinger?resource=acct:{acct}",
            scheme = self.scheme,
            acct = handle.acct(),
        );
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                log::debug!("webfinger transport failure at {host}: {err}");
                return None;
            }
        };
        if !response.status().is_success() {
            log::debug!("webfinger at {host} answered {}", response.status());
            return None;
        }
        let bytes = response.bytes().await.ok()?;
        let jrd: JrdDocument = serde_json::from_slice(&bytes).ok()?;
        let href = first_link(jrd)?;
        Url::parse(&href).ok()
    }
}

/// The first link's href. Later links are never consulted, even when the
/// first one carries no href.
fn first_link(jrd: JrdDocument) -> Option<String> {
    jrd.links.into_iter().next().and_then(|link| link.href)
}

/// The subset of a JSON Resource Descriptor the resolver reads.
#[derive(Debug, Deserialize)]
struct JrdDocument {
    #[serde(default)]
    links: Vec<JrdLink>,
}

#[derive(Debug, Deserialize)]
struct JrdLink {
    #[serde(default)]
    href: Option<String>,
}
