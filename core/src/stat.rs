//! Per-attempt outcome record

use std::time::Duration;

use crate::error::AttemptError;

/// Outcome of a single attempt.
///
/// Created by a worker, sent over the stats channel, and accounted exactly
/// once by the collector. A failed attempt still carries whatever phase
/// durations were accumulated before the failure.
#[derive(Debug, Default)]
pub struct Stat {
    /// Failure of the attempt, if any
    pub err: Option<AttemptError>,

    /// Time from dispatch until the response body was fully read
    pub latency: Duration,

    /// Response status code (0 when the attempt failed before a response line)
    pub status: u16,

    /// Time spent resolving the target host
    pub time_on_dns: Duration,

    /// Time spent in the TLS handshake
    pub time_on_tls: Duration,

    /// Time spent establishing the TCP connection
    pub time_on_connect: Duration,

    /// Time spent acquiring a connection from the pool
    pub time_on_get_conn: Duration,

    /// Serialized size of the request sent
    pub bytes_sent: u64,

    /// Body bytes read from the response
    pub bytes_received: u64,

    /// Whether the attempt ran on a pooled connection
    pub reused_conn: bool,
}

impl Stat {
    /// Whether the attempt produced a response without transport failure.
    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }
}
