//! Collector: stat aggregation and the final summary
//!
//! The collector is the single consumer of the stats channel. All of its
//! state — the latency histogram, status counter, error grouper, and
//! scalar accumulators — lives inside one spawned task, so accounting is
//! serially consistent and needs no locks or atomics. When the channel
//! closes (every worker gone, coordinator consumed) the task finishes and
//! [`EventCollector::summarise`] renders the result.

mod errors;
mod histogram;
mod status;
mod summary;

pub use errors::ErrorGrouper;
pub use histogram::LatencyHistogram;
pub use status::StatusCodeCounter;

use std::io;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::stat::Stat;

use summary::RunInfo;

/// Buffer size of the worker-to-collector stats channel.
pub const STATS_CHANNEL_CAPACITY: usize = 10_000;

/// Create the stats channel wiring workers to the collector.
pub fn stats_channel() -> (mpsc::Sender<Stat>, mpsc::Receiver<Stat>) {
    mpsc::channel(STATS_CHANNEL_CAPACITY)
}

/// Accumulated state for a run, owned by the consumer task.
#[derive(Debug, Default)]
pub(crate) struct Totals {
    pub(crate) latency: LatencyHistogram,
    pub(crate) statuses: StatusCodeCounter,
    pub(crate) errors: ErrorGrouper,
    pub(crate) seen: u64,
    pub(crate) bytes_sent: u64,
    pub(crate) bytes_received: u64,
    pub(crate) waiting_dns: Duration,
    pub(crate) waiting_tls: Duration,
    pub(crate) waiting_connect: Duration,
    pub(crate) waiting_get_conn: Duration,
    pub(crate) new_connections: u64,
}

impl Totals {
    /// Account one stat. Phase durations count for every attempt; the
    /// histogram, status counter, and byte totals only for attempts that
    /// produced a response.
    fn account(&mut self, stat: Stat) {
        self.seen += 1;
        self.waiting_dns += stat.time_on_dns;
        self.waiting_tls += stat.time_on_tls;
        self.waiting_connect += stat.time_on_connect;
        self.waiting_get_conn += stat.time_on_get_conn;

        match stat.err {
            Some(err) => self.errors.record(err.kind()),
            None => {
                self.latency.record(stat.latency);
                self.statuses.increment(stat.status);
                self.bytes_sent += stat.bytes_sent;
                self.bytes_received += stat.bytes_received;
                if !stat.reused_conn {
                    self.new_connections += 1;
                }
            }
        }
    }
}

/// Collects execution data over the run and renders the summary.
///
/// Wall time is measured from construction, so build the collector
/// immediately before starting the coordinator.
pub struct EventCollector {
    registered: Instant,
    info: RunInfo,
    rx: Option<mpsc::Receiver<Stat>>,
    consumer: Option<JoinHandle<Totals>>,
}

impl EventCollector {
    /// Create a collector over the receiving end of the stats channel.
    pub fn new(stats_rx: mpsc::Receiver<Stat>, cfg: &Config) -> Self {
        Self {
            registered: Instant::now(),
            info: RunInfo {
                endpoint: cfg.endpoint.to_string(),
                concurrency: cfg.workers(),
                duration: cfg.duration,
            },
            rx: Some(stats_rx),
            consumer: None,
        }
    }

    /// Launch the consumer task. Non-blocking; calling it twice is a no-op.
    pub fn start(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        self.consumer = Some(tokio::spawn(async move {
            let mut totals = Totals::default();
            while let Some(stat) = rx.recv().await {
                totals.account(stat);
            }
            totals
        }));
    }

    /// Wait for the stats channel to close and drain, then write the
    /// summary.
    ///
    /// Rendering problems degrade to an error event; the workload itself
    /// completed, so the caller still exits cleanly.
    pub async fn summarise<W: io::Write>(&mut self, out: &mut W) {
        let totals = match self.consumer.take() {
            Some(consumer) => match consumer.await {
                Ok(totals) => totals,
                Err(e) => {
                    tracing::error!(error = %e, "stat consumer task failed");
                    return;
                }
            },
            None => {
                tracing::error!("summarise called before start");
                return;
            }
        };

        let wall = self.registered.elapsed();
        if let Err(e) = summary::render(out, &totals, wall, &self.info) {
            tracing::error!(error = %e, "unable to render summary");
        }
    }
}
