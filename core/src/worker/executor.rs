//! Worker execution loop

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::AttemptError;
use crate::stat::Stat;
use crate::template::RequestTemplate;
use crate::trace::TraceState;
use crate::transport::Transport;

/// Executes attempts: recv -> round trip -> drain -> report -> repeat.
///
/// Workers are stateless tasks spawned by the coordinator. They share the
/// transport via `Arc` and publish stats over an mpsc channel; all
/// per-attempt state (the trace record, the in-progress stat) lives on the
/// worker's own stack.
pub struct Worker {
    id: usize,
    transport: Arc<dyn Transport>,
    requests: async_channel::Receiver<Arc<RequestTemplate>>,
    stats: mpsc::Sender<Stat>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        transport: Arc<dyn Transport>,
        requests: async_channel::Receiver<Arc<RequestTemplate>>,
        stats: mpsc::Sender<Stat>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            transport,
            requests,
            stats,
            timeout,
            cancel,
        }
    }

    /// Run until the request queue is closed and drained.
    pub async fn run(self) {
        tracing::debug!(worker_id = self.id, "worker started");
        let mut completed = 0u64;

        while let Ok(template) = self.requests.recv().await {
            let stat = self.attempt(&template).await;
            completed += 1;
            if self.stats.send(stat).await.is_err() {
                tracing::debug!(worker_id = self.id, "stats channel closed, stopping");
                break;
            }
        }

        tracing::debug!(worker_id = self.id, completed, "worker finished");
    }

    /// Perform one attempt, always yielding a Stat.
    async fn attempt(&self, template: &RequestTemplate) -> Stat {
        let mut stat = Stat::default();
        let mut trace = TraceState::default();
        let began = Instant::now();

        let result = {
            let exchange = self.exchange(template, &mut stat, &mut trace);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(AttemptError::Cancelled),
                result = deadline(self.timeout, exchange) => result,
            }
        };

        stat.latency = began.elapsed();
        stat.time_on_dns = trace.dns();
        stat.time_on_tls = trace.tls();
        stat.time_on_connect = trace.connect();
        stat.time_on_get_conn = trace.get_conn_time();
        stat.reused_conn = trace.reused();
        stat.err = result.err();
        stat
    }

    /// Dispatch the request and drain the body, filling in the stat as
    /// information becomes available so a partial failure still reports
    /// the status line and bytes read so far.
    async fn exchange(
        &self,
        template: &RequestTemplate,
        stat: &mut Stat,
        trace: &mut TraceState,
    ) -> Result<(), AttemptError> {
        let exchange = self.transport.round_trip(template, trace).await?;
        stat.status = exchange.status;
        stat.bytes_sent = exchange.bytes_sent;

        match exchange.body.drain().await {
            Ok(read) => {
                stat.bytes_received = read;
                Ok(())
            }
            Err(failure) => {
                stat.bytes_received = failure.bytes_read;
                Err(failure.error)
            }
        }
    }
}

/// Apply the per-attempt deadline; zero means none.
async fn deadline<F>(limit: Duration, attempt: F) -> Result<(), AttemptError>
where
    F: Future<Output = Result<(), AttemptError>>,
{
    if limit.is_zero() {
        return attempt.await;
    }
    match tokio::time::timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => Err(AttemptError::Timeout(limit)),
    }
}
