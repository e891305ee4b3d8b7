//! NodeInfo discovery: the two-step protocol probe that decides whether a
//! host is a federation node.
//!
//! Step one fetches `/.well-known/nodeinfo` and follows at most
//! [`MAX_REDIRECT_HOPS`] manual redirects to find the link document. Step two
//! fetches the advertised info document and extracts software and usage
//! metadata. Per-host failures never surface as errors; each one is captured
//! as a [`ProbeStatus`] in the resulting record.

use std::error::Error as _;
use std::io::ErrorKind;

use fedifinder_store::{InstanceRecord, ProbeStatus};
use reqwest::{header, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Result;

/// Redirect hops followed during link discovery before giving up.
pub const MAX_REDIRECT_HOPS: u8 = 2;

/// Outcome of a single well-known discovery step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WellKnownOutcome {
    /// Link document found; carries the href of the info document.
    Links(String),
    /// 301/302 naming another authority to probe.
    Redirect(String),
    /// No link document at this authority.
    Failure(ProbeStatus),
}

/// Result of the bounded redirect loop around
/// [`NodeInfoClient::discover_links`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDiscovery {
    /// Info-document href.
    Found(String),
    /// Definitive failure; the record becomes "not federated".
    Failed(ProbeStatus),
    /// Redirect budget spent without an answer; the verdict stays open.
    Exhausted,
}

/// HTTP client for both discovery steps.
#[derive(Debug, Clone)]
pub struct NodeInfoClient {
    client: reqwest::Client,
    scheme: &'static str,
}

impl NodeInfoClient {
    /// Automatic redirects are disabled; hops are followed manually so the
    /// loop stays bounded even across mutually redirecting hosts.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            scheme: config.scheme(),
        })
    }

    /// One discovery step against one authority.
    pub async fn discover_links(&self, authority: &str) -> WellKnownOutcome {
        let url = format!("{}://{authority}/.well-known/nodeinfo", self.scheme);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => return WellKnownOutcome::Failure(classify_transport_error(&err)),
        };
        let status = response.status();
        if status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND {
            // A redirect without a usable absolute target is recorded under
            // its own HTTP code, which also makes it sweepable.
            return match redirect_authority(&response) {
                Some(next) => WellKnownOutcome::Redirect(next),
                None => WellKnownOutcome::Failure(ProbeStatus::Http(status.as_u16())),
            };
        }
        if !status.is_success() {
            return WellKnownOutcome::Failure(ProbeStatus::Http(status.as_u16()));
        }
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return WellKnownOutcome::Failure(classify_transport_error(&err)),
        };
        match serde_json::from_slice::<WellKnownDocument>(&bytes) {
            Ok(doc) => match doc.links.into_iter().next().and_then(|link| link.href) {
                Some(href) => WellKnownOutcome::Links(href),
                None => WellKnownOutcome::Failure(ProbeStatus::MalformedResponse),
            },
            Err(_) => WellKnownOutcome::Failure(ProbeStatus::MalformedResponse),
        }
    }

    /// Run the redirect loop until a link document, a definitive failure, or
    /// hop exhaustion.
    pub async fn locate_links(&self, authority: &str) -> LinkDiscovery {
        let mut authority = authority.to_owned();
        let mut hops = 0u8;
        loop {
            match self.discover_links(&authority).await {
                WellKnownOutcome::Links(href) => return LinkDiscovery::Found(href),
                WellKnownOutcome::Failure(status) => return LinkDiscovery::Failed(status),
                WellKnownOutcome::Redirect(next) => {
                    if hops == MAX_REDIRECT_HOPS {
                        log::debug!("{authority}: redirect budget spent, next hop was {next}");
                        return LinkDiscovery::Exhausted;
                    }
                    hops += 1;
                    log::debug!("discovery hop {hops}: {authority} -> {next}");
                    authority = next;
                }
            }
        }
    }

    /// Fetch and parse the info document behind `href`.
    pub async fn fetch_info(
        &self,
        href: &str,
    ) -> std::result::Result<NodeInfoDocument, ProbeStatus> {
        let response = match self.client.get(href).send().await {
            Ok(response) => response,
            Err(err) => return Err(classify_transport_error(&err)),
        };
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeStatus::Http(status.as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| classify_transport_error(&err))?;
        serde_json::from_slice(&bytes).map_err(|_| ProbeStatus::MalformedResponse)
    }

    /// Terminal half of a probe once link discovery produced `href`. The
    /// record is keyed by `domain`, not by whichever host served the
    /// documents.
    pub async fn probe_links(&self, domain: &str, href: &str) -> InstanceRecord {
        match self.fetch_info(href).await {
            Ok(doc) => doc.into_record(domain),
            Err(status) => InstanceRecord::not_federated(domain, status),
        }
    }

    /// Full discovery for one domain: link discovery, then the info fetch.
    pub async fn probe(&self, domain: &str) -> InstanceRecord {
        match self.locate_links(domain).await {
            LinkDiscovery::Found(href) => self.probe_links(domain, &href).await,
            LinkDiscovery::Failed(status) => InstanceRecord::not_federated(domain, status),
            LinkDiscovery::Exhausted => {
                InstanceRecord::unresolved(domain, ProbeStatus::TooManyRedirects)
            }
        }
    }
}

/// Authority named by a redirect response. Relative `Location` values cannot
/// name a new host and do not count.
fn redirect_authority(response: &reqwest::Response) -> Option<String> {
    let location = response.headers().get(header::LOCATION)?.to_str().ok()?;
    let url = Url::parse(location).ok()?;
    url_authority(&url)
}

/// `host[:port]` of a URL.
pub(crate) fn url_authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

/// Map a transport-level failure onto the recorded status taxonomy. The io
/// error kind buried in the chain is more precise than reqwest's own
/// classification, so it wins when present.
fn classify_transport_error(error: &reqwest::Error) -> ProbeStatus {
    if error.is_timeout() {
        return ProbeStatus::Timeout;
    }
    let mut source = error.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return match io.kind() {
                ErrorKind::ConnectionRefused => ProbeStatus::ConnectRefused,
                ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe => ProbeStatus::ConnectReset,
                ErrorKind::TimedOut => ProbeStatus::Timeout,
                // tokio-rustls surfaces handshake failures as InvalidData
                ErrorKind::InvalidData => ProbeStatus::Tls,
                _ => ProbeStatus::Unreachable,
            };
        }
        source = inner.source();
    }
    ProbeStatus::Unreachable
}

/// The well-known link document: an array of links to versioned info
/// documents.
#[derive(Debug, Deserialize)]
struct WellKnownDocument {
    #[serde(default)]
    links: Vec<WellKnownLink>,
}

#[derive(Debug, Deserialize)]
struct WellKnownLink {
    #[serde(default)]
    href: Option<String>,
}

/// The subset of a NodeInfo document the resolver keeps.
///
/// Counters a server chooses not to publish stay `None`; absent and zero are
/// different answers.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfoDocument {
    #[serde(default)]
    software: Option<NodeInfoSoftware>,
    #[serde(default)]
    usage: Option<NodeInfoUsage>,
    #[serde(rename = "openRegistrations", default)]
    open_registrations: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NodeInfoSoftware {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NodeInfoUsage {
    #[serde(default)]
    users: Option<NodeInfoUsers>,
    #[serde(rename = "localPosts", default)]
    local_posts: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NodeInfoUsers {
    #[serde(default)]
    total: Option<u64>,
    #[serde(rename = "activeMonth", default)]
    active_month: Option<u64>,
    #[serde(rename = "activeHalfyear", default)]
    active_halfyear: Option<u64>,
}

impl NodeInfoDocument {
    /// A parsed document without a software name is not a federation answer;
    /// it is recorded as malformed rather than as a nameless instance.
    pub(crate) fn into_record(self, domain: &str) -> InstanceRecord {
        let software = self.software.unwrap_or_default();
        let Some(name) = software.name else {
            return InstanceRecord::not_federated(domain, ProbeStatus::MalformedResponse);
        };
        let usage = self.usage.unwrap_or_default();
        let users = usage.users.unwrap_or_default();
        InstanceRecord {
            part_of_fediverse: Some(true),
            software_name: Some(name),
            software_version: software.version,
            users_total: users.total,
            users_active_month: users.active_month,
            users_active_halfyear: users.active_halfyear,
            local_posts: usage.local_posts,
            open_registrations: self.open_registrations,
            ..InstanceRecord::unknown(domain)
        }
    }
}
