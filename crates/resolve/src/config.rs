//! Tuning knobs for the HTTP clients and the batch orchestrator.

use std::time::Duration;

/// Per-request timeout applied to every lookup and discovery call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Concurrent per-domain probes within one batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Automatic re-attempts for transient failures stop at this count.
pub const DEFAULT_RETRY_CEILING: u32 = 5;

/// Settings shared by the webfinger and nodeinfo clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    /// Probe over https. Loopback tests turn this off.
    pub tls_only: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            tls_only: true,
        }
    }
}

impl ClientConfig {
    pub(crate) fn scheme(&self) -> &'static str {
        if self.tls_only {
            "https"
        } else {
            "http"
        }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub max_concurrency: usize,
    /// A transient-failure record at or above this retry count is no longer
    /// re-probed automatically.
    pub retry_ceiling: u32,
    pub client: ClientConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            client: ClientConfig::default(),
        }
    }
}
