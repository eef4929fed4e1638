//! Connection pool shared by all workers

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Empty;
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::error::AttemptError;

/// Idle connections older than this are discarded at checkout.
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Key identifying a reusable connection target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Origin {
    pub https: bool,
    pub host: String,
    pub port: u16,
}

impl Origin {
    /// Derive the origin of a URL.
    pub(crate) fn of(url: &Url) -> Result<Self, AttemptError> {
        let host = url
            .host_str()
            .ok_or_else(|| AttemptError::Http("url has no host".into()))?
            .to_string();
        let https = url.scheme() == "https";
        let port = url
            .port_or_known_default()
            .ok_or_else(|| AttemptError::Http("url has no port".into()))?;
        Ok(Self { https, host, port })
    }

    /// `host:port` form used for Host headers and dialing.
    pub(crate) fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Protocol-specific dispatch handle for one live connection.
///
/// One request at a time per handle; an HTTP/2 connection is pooled the
/// same way rather than multiplexed so reuse accounting stays uniform.
#[derive(Debug)]
pub(crate) enum ProtocolSender {
    Http1(http1::SendRequest<Empty<Bytes>>),
    Http2(http2::SendRequest<Empty<Bytes>>),
}

impl ProtocolSender {
    pub(crate) fn is_closed(&self) -> bool {
        match self {
            ProtocolSender::Http1(sender) => sender.is_closed(),
            ProtocolSender::Http2(sender) => sender.is_closed(),
        }
    }

    pub(crate) fn is_http2(&self) -> bool {
        matches!(self, ProtocolSender::Http2(_))
    }

    pub(crate) async fn send(
        &mut self,
        request: Request<Empty<Bytes>>,
    ) -> hyper::Result<Response<Incoming>> {
        match self {
            ProtocolSender::Http1(sender) => {
                sender.ready().await?;
                sender.send_request(request).await
            }
            ProtocolSender::Http2(sender) => {
                sender.ready().await?;
                sender.send_request(request).await
            }
        }
    }
}

/// A checked-out connection.
///
/// Holds its live-connection permit (when a cap is configured) so dropping
/// the connection frees capacity for a new dial.
#[derive(Debug)]
pub(crate) struct Conn {
    pub(crate) sender: ProtocolSender,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Conn {
    pub(crate) fn new(sender: ProtocolSender, permit: Option<OwnedSemaphorePermit>) -> Self {
        Self {
            sender,
            _permit: permit,
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

struct Idle {
    conn: Conn,
    parked_at: Instant,
}

/// Idle-connection pool keyed by origin.
///
/// Internally synchronised; checkout and checkin take the lock briefly and
/// never across an await point.
pub(crate) struct Pool {
    idle: Mutex<HashMap<Origin, VecDeque<Idle>>>,
    limit: Option<Arc<Semaphore>>,
}

impl Pool {
    /// Create a pool capping total live connections at `max_connections`
    /// (0 = unlimited).
    pub(crate) fn new(max_connections: usize) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            limit: (max_connections > 0).then(|| Arc::new(Semaphore::new(max_connections))),
        }
    }

    /// Pop a usable idle connection for the origin, discarding closed or
    /// stale ones along the way.
    pub(crate) fn checkout(&self, origin: &Origin) -> Option<Conn> {
        let mut idle = match self.idle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let queue = idle.get_mut(origin)?;
        while let Some(parked) = queue.pop_back() {
            if parked.parked_at.elapsed() > IDLE_TIMEOUT {
                continue;
            }
            if parked.conn.is_closed() {
                continue;
            }
            return Some(parked.conn);
        }
        None
    }

    /// Park a connection for reuse; closed connections are dropped.
    pub(crate) fn checkin(&self, origin: Origin, conn: Conn) {
        if conn.is_closed() {
            return;
        }
        let mut idle = match self.idle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        idle.entry(origin).or_default().push_back(Idle {
            conn,
            parked_at: Instant::now(),
        });
    }

    /// Reserve capacity for a new connection, waiting when the cap is
    /// reached. The permit travels with the connection.
    pub(crate) async fn reserve(&self) -> Option<OwnedSemaphorePermit> {
        match &self.limit {
            Some(limit) => Arc::clone(limit).acquire_owned().await.ok(),
            None => None,
        }
    }
}
