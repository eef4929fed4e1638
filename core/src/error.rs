//! Error types for vessel-core

use std::time::Duration;

use thiserror::Error;

/// Fatal errors raised while preparing a run.
///
/// These abort before any attempt is made. Failures of individual attempts
/// are data, not errors — see [`AttemptError`].
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration rejected by validation
    #[error("configuration error: {0}")]
    Config(String),

    /// The request template could not be constructed from the config
    #[error("invalid request template: {0}")]
    Template(String),

    /// The HTTP client could not be constructed (TLS setup, proxy parsing)
    #[error("client setup failed: {0}")]
    Client(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for fatal setup paths
pub type Result<T> = std::result::Result<T, Error>;

/// Categorical bucket assigned to a failed attempt.
///
/// The summary groups errors by kind rather than dumping the raw list;
/// classification is stable for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Name resolution failed
    Dns,
    /// TLS handshake failed or certificate rejected
    Tls,
    /// The per-attempt deadline elapsed
    Timeout,
    /// Parent interrupt or explicit cancellation before a response
    Cancelled,
    /// TCP refused, reset by peer, or otherwise failed post-DNS
    Connection,
    /// Anything unclassified
    Unknown,
}

impl ErrorKind {
    /// All kinds, in the order the summary reports them.
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Timeout,
        ErrorKind::Cancelled,
        ErrorKind::Dns,
        ErrorKind::Tls,
        ErrorKind::Connection,
        ErrorKind::Unknown,
    ];
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Dns => "DNS",
            ErrorKind::Tls => "TLS",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Connection => "Connection",
            ErrorKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Failure of a single attempt.
///
/// Carried on the [`Stat`](crate::Stat) of the attempt and accounted by the
/// collector's error grouper; never aborts the run.
#[derive(Error, Debug)]
pub enum AttemptError {
    /// Name resolution failed before a connection was made
    #[error("dns lookup failed: {0}")]
    Dns(String),

    /// The TLS handshake failed, timed out, or the certificate was rejected
    #[error("tls handshake failed: {0}")]
    Tls(String),

    /// The per-attempt deadline elapsed
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The attempt was abandoned because the run was cancelled
    #[error("attempt cancelled")]
    Cancelled,

    /// The TCP connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// The exchange failed after the connection was established
    #[error("{0}")]
    Http(String),
}

impl AttemptError {
    /// Classify this error into its reporting bucket.
    ///
    /// Structured causes map directly; transport failures that only surface
    /// a message fall back to substring matching before `Unknown`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AttemptError::Dns(_) => ErrorKind::Dns,
            AttemptError::Tls(_) => ErrorKind::Tls,
            AttemptError::Timeout(_) => ErrorKind::Timeout,
            AttemptError::Cancelled => ErrorKind::Cancelled,
            AttemptError::Connect(_) => ErrorKind::Connection,
            AttemptError::Http(message) => classify_message(message),
        }
    }
}

/// Best-effort classification of an opaque transport error message.
fn classify_message(message: &str) -> ErrorKind {
    let message = message.to_ascii_lowercase();
    if message.contains("connection refused") || message.contains("connection reset by peer") {
        return ErrorKind::Connection;
    }
    if message.contains("dns") || message.contains("failed to lookup address") {
        return ErrorKind::Dns;
    }
    if message.contains("tls") || message.contains("certificate") {
        return ErrorKind::Tls;
    }
    ErrorKind::Unknown
}
