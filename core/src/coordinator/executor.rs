//! Coordinator execution logic

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::stat::Stat;
use crate::template::RequestTemplate;
use crate::transport::Transport;
use crate::worker::Worker;

/// Drives the workload to completion under the termination policy.
///
/// Shutdown contract: the admission loop closes the queue exactly once
/// (sender dropped), workers exit after draining it, and the stats channel
/// closes only when the coordinator — the holder of the last sender — is
/// consumed by [`Coordinator::wait`].
pub struct Coordinator {
    config: Config,
    template: Arc<RequestTemplate>,
    transport: Arc<dyn Transport>,
    stats_tx: mpsc::Sender<Stat>,
    cancel: CancellationToken,
    workers: JoinSet<()>,
    admission: Option<tokio::task::JoinHandle<u64>>,
}

impl Coordinator {
    pub(crate) fn new(
        config: Config,
        template: Arc<RequestTemplate>,
        transport: Arc<dyn Transport>,
        stats_tx: mpsc::Sender<Stat>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            template,
            transport,
            stats_tx,
            cancel,
            workers: JoinSet::new(),
            admission: None,
        }
    }

    /// Launch the worker pool and the admission loop. Non-blocking.
    pub fn start(&mut self) {
        let worker_count = self.config.workers();
        // Queue capacity equals the worker count so admission blocks as
        // soon as every worker is busy.
        let (queue_tx, queue_rx) = async_channel::bounded(worker_count);

        for id in 0..worker_count {
            let worker = Worker::new(
                id,
                Arc::clone(&self.transport),
                queue_rx.clone(),
                self.stats_tx.clone(),
                self.config.timeout,
                self.cancel.clone(),
            );
            self.workers.spawn(worker.run());
        }
        drop(queue_rx);

        let admission = Admission {
            queue: queue_tx,
            template: Arc::clone(&self.template),
            amount: self.config.amount,
            duration: self.config.duration,
            cancel: self.cancel.clone(),
        };
        self.admission = Some(tokio::spawn(admission.run()));

        tracing::info!(
            workers = worker_count,
            amount = self.config.amount,
            duration = ?self.config.duration,
            max_rps = self.config.max_rps,
            endpoint = %self.config.endpoint,
            "run started"
        );
    }

    /// Wait for admission to finish and every worker to drain and exit.
    ///
    /// Consumes the coordinator: dropping it afterwards releases the last
    /// stats sender, letting the collector finalise.
    pub async fn wait(mut self) {
        if let Some(admission) = self.admission.take() {
            match admission.await {
                Ok(admitted) => tracing::debug!(admitted, "admission finished"),
                Err(e) => tracing::error!(error = %e, "admission task panicked"),
            }
        }

        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker task panicked");
            }
        }
    }
}

/// The admission loop: one queue send per iteration until a termination
/// signal fires.
struct Admission {
    queue: async_channel::Sender<Arc<RequestTemplate>>,
    template: Arc<RequestTemplate>,
    amount: u64,
    duration: Duration,
    cancel: CancellationToken,
}

impl Admission {
    async fn run(self) -> u64 {
        let deadline = (!self.duration.is_zero())
            .then(|| tokio::time::Instant::now() + self.duration);
        let mut admitted = 0u64;

        loop {
            // Count-based runs stop once the full amount has been handed
            // out; duration runs keep admitting until the timer fires.
            if deadline.is_none() && admitted == self.amount {
                break;
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::debug!(admitted, "admission cancelled");
                    break;
                }

                _ = until(deadline) => {
                    tracing::debug!(admitted, "duration reached");
                    break;
                }

                sent = self.queue.send(Arc::clone(&self.template)) => {
                    if sent.is_err() {
                        break;
                    }
                    admitted += 1;
                }
            }
        }

        // Dropping the sender closes the queue; workers exit once it is
        // drained.
        admitted
    }
}

/// Resolve at the deadline, or never when the run is not time-bound.
async fn until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
