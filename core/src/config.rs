//! Workload configuration

use std::time::Duration;

use http::{HeaderMap, Method};
use url::Url;

use crate::TOOL_AGENT;

/// Workload parameters for a single run.
///
/// Constructed once by the caller (normally the CLI layer, which has already
/// validated and parsed the raw flag values) and read-only for the engine.
///
/// Exactly one of `amount` or `duration` must be positive; the run either
/// issues a fixed number of requests or keeps issuing them for a wall-clock
/// span. [`Config::validate`] enforces the shape.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target URL
    pub endpoint: Url,

    /// HTTP verb to perform
    pub method: Method,

    /// Total number of requests (0 = unused, duration drives the run)
    pub amount: u64,

    /// Wall-clock span to send requests for (zero = unused)
    pub duration: Duration,

    /// Number of concurrent workers (clamped to at least 1 via [`Config::workers`])
    pub concurrency: usize,

    /// Maximum in-flight requests (0 = unlimited)
    pub max_rps: usize,

    /// Per-request deadline (zero = none)
    pub timeout: Duration,

    /// User-supplied headers, already validated
    pub headers: HeaderMap,

    /// Override for the Host header
    pub host_override: Option<String>,

    /// Basic-auth credentials as (user, password)
    pub basic_auth: Option<(String, String)>,

    /// User-agent value; always includes the tool identifier
    pub user_agent: String,

    /// Skip server certificate verification
    pub insecure_tls: bool,

    /// Offer HTTP/2 via ALPN
    pub http2: bool,

    /// Follow redirect responses
    pub follow_redirects: bool,

    /// Cap on live connections (0 = unlimited)
    pub max_connections: usize,
}

impl Config {
    /// Create a config for the given endpoint with the tool defaults:
    /// 50 requests, 10 workers, no rate limit, no timeout.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            method: Method::GET,
            amount: 50,
            duration: Duration::ZERO,
            concurrency: 10,
            max_rps: 0,
            timeout: Duration::ZERO,
            headers: HeaderMap::new(),
            host_override: None,
            basic_auth: None,
            user_agent: TOOL_AGENT.to_string(),
            insecure_tls: false,
            http2: false,
            follow_redirects: true,
            max_connections: 0,
        }
    }

    /// Set the fixed request count (clears any duration).
    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self.duration = Duration::ZERO;
        self
    }

    /// Set the wall-clock duration (clears any fixed amount).
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self.amount = 0;
        self
    }

    /// Set the worker count.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the in-flight cap.
    pub fn with_max_rps(mut self, max_rps: usize) -> Self {
        self.max_rps = max_rps;
        self
    }

    /// Set the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Worker count to actually spawn.
    pub fn workers(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Validate the workload shape.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match self.endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::InvalidEndpoint(format!(
                    "unsupported scheme '{other}'"
                )))
            }
        }
        if self.endpoint.host_str().is_none() {
            return Err(ConfigError::InvalidEndpoint("missing host".into()));
        }
        if self.amount == 0 && self.duration.is_zero() {
            return Err(ConfigError::InvalidWorkload(
                "either a request count or a duration must be set".into(),
            ));
        }
        if self.amount > 0 && !self.duration.is_zero() {
            return Err(ConfigError::InvalidWorkload(
                "request count and duration are mutually exclusive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The target URL cannot be benchmarked
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The amount/duration pair does not describe a runnable workload
    #[error("invalid workload: {0}")]
    InvalidWorkload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Url {
        Url::parse("http://localhost:8080/status/200").unwrap()
    }

    #[test]
    fn defaults_are_a_valid_fixed_count_run() {
        let cfg = Config::new(endpoint());
        assert_eq!(cfg.amount, 50);
        assert!(cfg.duration.is_zero());
        assert_eq!(cfg.concurrency, 10);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn duration_mode_clears_amount() {
        let cfg = Config::new(endpoint()).with_duration(Duration::from_secs(2));
        assert_eq!(cfg.amount, 0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_workload_is_rejected() {
        let mut cfg = Config::new(endpoint());
        cfg.amount = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidWorkload(_))
        ));
    }

    #[test]
    fn both_amount_and_duration_is_rejected() {
        let mut cfg = Config::new(endpoint());
        cfg.duration = Duration::from_secs(1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let cfg = Config::new(Url::parse("ftp://host/file").unwrap());
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn zero_concurrency_clamps_to_one_worker() {
        let cfg = Config::new(endpoint()).with_concurrency(0);
        assert_eq!(cfg.workers(), 1);
    }
}
