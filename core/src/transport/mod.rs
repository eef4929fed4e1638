//! Transport seam between workers and the wire
//!
//! Workers drive attempts through the [`Transport`] trait: one virtual call
//! per attempt, returning the response head as an [`Exchange`] while the
//! body is drained separately by the caller. The production chain is
//! [`Throttled`] wrapping [`HttpClient`]; tests substitute mocks.

mod client;
mod dial;
mod pool;
mod throttle;
mod tls;

pub use client::{HttpClient, StreamingBody};
pub use throttle::Throttled;

use async_trait::async_trait;

use crate::error::AttemptError;
use crate::template::RequestTemplate;
use crate::trace::TraceState;

/// A transport capable of performing one HTTP exchange.
///
/// Implementations stamp phase boundaries into the attempt's [`TraceState`]
/// as they resolve, connect, and acquire connections. The trait is object
/// safe so the coordinator can hand workers an `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the prepared request once, returning when the response line
    /// and headers have arrived.
    async fn round_trip(
        &self,
        template: &RequestTemplate,
        trace: &mut TraceState,
    ) -> Result<Exchange, AttemptError>;
}

/// Response head handed back by [`Transport::round_trip`].
#[derive(Debug)]
pub struct Exchange {
    /// Response status code
    pub status: u16,

    /// Serialized size of the request that was sent
    pub bytes_sent: u64,

    /// The response body, not yet consumed
    pub body: ResponseBody,
}

/// Un-drained response body.
///
/// The worker drains it before emitting the attempt's Stat so the body
/// lifetime coincides with the attempt and pooled connections are released
/// deterministically.
#[derive(Debug)]
pub enum ResponseBody {
    /// No body (or a body of known size needing no IO); used by mocks
    Sized(u64),

    /// A streaming body on a live pooled connection
    Streaming(StreamingBody),
}

impl ResponseBody {
    /// Consume the body, returning the number of body bytes read.
    pub async fn drain(self) -> Result<u64, BodyError> {
        match self {
            ResponseBody::Sized(bytes) => Ok(bytes),
            ResponseBody::Streaming(body) => body.drain().await,
        }
    }
}

/// A body read that failed part-way through.
///
/// The bytes read before the failure are still reported so the attempt's
/// Stat can account them.
#[derive(Debug)]
pub struct BodyError {
    /// Body bytes successfully read before the failure
    pub bytes_read: u64,

    /// The underlying failure
    pub error: AttemptError,
}
