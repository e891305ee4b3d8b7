//! Persisted models: per-domain instance records and their status codes.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Why a probe did not end in a federated verdict.
///
/// HTTP statuses keep their numeric form; transport-level failures get a
/// stable label. The split matters to the retry policy: transient transport
/// failures are retried up to a ceiling, everything else waits for an
/// administrative sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeStatus {
    /// Terminal HTTP status from either discovery step.
    Http(u16),
    Timeout,
    ConnectRefused,
    ConnectReset,
    Tls,
    MalformedResponse,
    TooManyRedirects,
    /// Transport failure without a finer classification (DNS, routing).
    Unreachable,
}

impl ProbeStatus {
    /// Transient statuses are retry-eligible below the retry ceiling.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ConnectRefused | Self::ConnectReset | Self::Unreachable
        )
    }

    fn label(self) -> Option<&'static str> {
        match self {
            Self::Http(_) => None,
            Self::Timeout => Some("timeout"),
            Self::ConnectRefused => Some("connect_refused"),
            Self::ConnectReset => Some("connect_reset"),
            Self::Tls => Some("tls"),
            Self::MalformedResponse => Some("malformed_response"),
            Self::TooManyRedirects => Some("too_many_redirects"),
            Self::Unreachable => Some("unreachable"),
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "timeout" => Some(Self::Timeout),
            "connect_refused" => Some(Self::ConnectRefused),
            "connect_reset" => Some(Self::ConnectReset),
            "tls" => Some(Self::Tls),
            "malformed_response" => Some(Self::MalformedResponse),
            "too_many_redirects" => Some(Self::TooManyRedirects),
            "unreachable" => Some(Self::Unreachable),
            _ => None,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(code) => write!(f, "{code}"),
            other => f.write_str(other.label().unwrap_or("unknown")),
        }
    }
}

// The status column holds either an HTTP status number or an error label, so
// the serde form is number-or-string rather than a tagged enum.
impl Serialize for ProbeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Http(code) => serializer.serialize_u16(*code),
            other => serializer.serialize_str(other.label().unwrap_or("unknown")),
        }
    }
}

impl<'de> Deserialize<'de> for ProbeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl Visitor<'_> for StatusVisitor {
            type Value = ProbeStatus;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an HTTP status number or a status label")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<ProbeStatus, E> {
                u16::try_from(value)
                    .map(ProbeStatus::Http)
                    .map_err(|_| E::custom(format!("status code out of range: {value}")))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<ProbeStatus, E> {
                u64::try_from(value)
                    .map_err(|_| E::custom(format!("status code out of range: {value}")))
                    .and_then(|v| self.visit_u64(v))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ProbeStatus, E> {
                ProbeStatus::from_label(value)
                    .ok_or_else(|| E::custom(format!("unknown status label: {value}")))
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

/// Status values the administrative sweep treats as permanently failed.
pub const PERMANENT_FAILURE_STATUSES: &[ProbeStatus] = &[
    ProbeStatus::Http(404),
    ProbeStatus::Http(410),
    ProbeStatus::Http(500),
    ProbeStatus::Http(501),
    ProbeStatus::Http(503),
    ProbeStatus::Http(504),
    ProbeStatus::Http(301),
    ProbeStatus::Http(302),
];

/// Transport statuses the sweep forgets so the domains are probed fresh
/// instead of sitting at the retry ceiling forever.
pub const TRANSIENT_FAILURE_STATUSES: &[ProbeStatus] = &[
    ProbeStatus::Timeout,
    ProbeStatus::ConnectRefused,
    ProbeStatus::ConnectReset,
    ProbeStatus::Unreachable,
];

/// Everything known about one domain.
///
/// `part_of_fediverse` is tri-state: `None` until a probe reaches a verdict.
/// Usage counters mirror the info document and stay `None` when the server
/// does not publish them; `None` and zero are different answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_of_fediverse: Option<bool>,
    /// Authoritative host, recorded only when it differs from `domain`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_active_month: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_active_halfyear: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_posts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_registrations: Option<bool>,
    /// Set only when the last probe failed; cleared on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProbeStatus>,
    #[serde(default)]
    pub retries: u32,
}

impl InstanceRecord {
    /// Blank record for a domain no probe has reached a verdict on.
    #[must_use]
    pub fn unknown(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            part_of_fediverse: None,
            local_domain: None,
            software_name: None,
            software_version: None,
            users_total: None,
            users_active_month: None,
            users_active_halfyear: None,
            local_posts: None,
            open_registrations: None,
            status: None,
            retries: 0,
        }
    }

    /// Probe reached the host and got a definitive "not part of the
    /// federation" answer.
    #[must_use]
    pub fn not_federated(domain: impl Into<String>, status: ProbeStatus) -> Self {
        Self {
            part_of_fediverse: Some(false),
            status: Some(status),
            retries: 1,
            ..Self::unknown(domain)
        }
    }

    /// Probe aborted without a verdict (redirect exhaustion and the like).
    #[must_use]
    pub fn unresolved(domain: impl Into<String>, status: ProbeStatus) -> Self {
        Self {
            status: Some(status),
            retries: 1,
            ..Self::unknown(domain)
        }
    }

    #[must_use]
    pub fn is_federated(&self) -> bool {
        self.part_of_fediverse == Some(true)
    }

    /// Whether the orchestrator may re-probe this record automatically.
    #[must_use]
    pub fn retry_eligible(&self, ceiling: u32) -> bool {
        self.status.is_some_and(ProbeStatus::is_transient) && self.retries < ceiling
    }
}

/// Display-relevant subset of a federated record, as published in the
/// known-instances snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownInstance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_registrations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_total: Option<u64>,
}

impl KnownInstance {
    #[must_use]
    pub fn from_record(record: &InstanceRecord) -> Self {
        Self {
            software_name: record.software_name.clone(),
            software_version: record.software_version.clone(),
            open_registrations: record.open_registrations,
            local_domain: record.local_domain.clone(),
            users_total: record.users_total,
        }
    }

    /// Rehydrate a full record for the snapshot fast path. Counters the
    /// snapshot does not carry stay `None`.
    #[must_use]
    pub fn to_record(&self, domain: impl Into<String>) -> InstanceRecord {
        InstanceRecord {
            part_of_fediverse: Some(true),
            local_domain: self.local_domain.clone(),
            software_name: self.software_name.clone(),
            software_version: self.software_version.clone(),
            users_total: self.users_total,
            open_registrations: self.open_registrations,
            ..InstanceRecord::unknown(domain)
        }
    }
}
