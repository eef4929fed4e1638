//! In-flight request gate

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::AttemptError;
use crate::template::RequestTemplate;
use crate::trace::TraceState;

use super::{Exchange, Transport};

/// Transport middleware bounding the number of in-flight requests.
///
/// The cap is concurrency-in-flight, not requests-per-second: a counted
/// semaphore of `max_in_flight` permits gates the inner transport, so at
/// most that many attempts can be between dispatch and response head at any
/// instant. A cap of 0 disables the gate entirely.
///
/// The permit is released when `round_trip` returns, success or error,
/// whether or not the body has been consumed. Acquisition is FIFO.
#[derive(Debug)]
pub struct Throttled<T> {
    inner: T,
    permits: Option<Arc<Semaphore>>,
}

impl<T> Throttled<T> {
    /// Wrap `inner`, allowing at most `max_in_flight` concurrent calls
    /// (0 = pass-through).
    pub fn new(max_in_flight: usize, inner: T) -> Self {
        Self {
            inner,
            permits: (max_in_flight > 0).then(|| Arc::new(Semaphore::new(max_in_flight))),
        }
    }

    /// Whether the gate is active.
    pub fn is_throttling(&self) -> bool {
        self.permits.is_some()
    }
}

#[async_trait]
impl<T: Transport> Transport for Throttled<T> {
    async fn round_trip(
        &self,
        template: &RequestTemplate,
        trace: &mut TraceState,
    ) -> Result<Exchange, AttemptError> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .acquire()
                    .await
                    .map_err(|_| AttemptError::Cancelled)?,
            ),
            None => None,
        };
        self.inner.round_trip(template, trace).await
    }
}
