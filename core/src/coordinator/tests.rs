//! Tests for the coordinator lifecycle

use super::builder::CoordinatorBuilder;
use crate::error::ErrorKind;
use crate::template::RequestTemplate;
use crate::trace::TraceState;
use crate::transport::{Exchange, ResponseBody, Throttled, Transport};
use crate::{AttemptError, Config, Stat};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

// ============================================================================
// Mock transport
// ============================================================================

struct MockTransport {
    status: u16,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTransport {
    fn new(status: u16) -> Self {
        Self {
            status,
            delay: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn round_trip(
        &self,
        _template: &RequestTemplate,
        trace: &mut TraceState,
    ) -> Result<Exchange, AttemptError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        trace.get_conn();
        trace.got_conn(false);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Exchange {
            status: self.status,
            bytes_sent: 50,
            body: ResponseBody::Sized(10),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn config(amount: u64, concurrency: usize) -> Config {
    Config::new(Url::parse("http://localhost:9/status/200").unwrap())
        .with_amount(amount)
        .with_concurrency(concurrency)
}

async fn drain(mut stats_rx: mpsc::Receiver<Stat>) -> Vec<Stat> {
    let mut stats = Vec::new();
    while let Some(stat) = stats_rx.recv().await {
        stats.push(stat);
    }
    stats
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn fixed_amount_produces_exactly_that_many_stats() {
    let (stats_tx, stats_rx) = mpsc::channel(1024);
    let transport = Arc::new(MockTransport::new(200));

    let mut coordinator = CoordinatorBuilder::new()
        .config(config(100, 8))
        .stats_tx(stats_tx)
        .transport(transport)
        .build()
        .expect("build failed");

    coordinator.start();
    coordinator.wait().await;

    let stats = drain(stats_rx).await;
    assert_eq!(stats.len(), 100);
    assert!(stats.iter().all(|s| s.status == 200));
}

#[tokio::test]
async fn zero_concurrency_still_completes() {
    let (stats_tx, stats_rx) = mpsc::channel(64);
    let mut coordinator = CoordinatorBuilder::new()
        .config(config(10, 0))
        .stats_tx(stats_tx)
        .transport(Arc::new(MockTransport::new(204)))
        .build()
        .expect("build failed");

    coordinator.start();
    coordinator.wait().await;

    assert_eq!(drain(stats_rx).await.len(), 10);
}

#[tokio::test]
async fn duration_mode_runs_for_at_least_the_span() {
    let (stats_tx, stats_rx) = mpsc::channel(4096);
    let cfg = Config::new(Url::parse("http://localhost:9/").unwrap())
        .with_duration(Duration::from_millis(200))
        .with_concurrency(4);

    let mut coordinator = CoordinatorBuilder::new()
        .config(cfg)
        .stats_tx(stats_tx)
        .transport(Arc::new(
            MockTransport::new(204).with_delay(Duration::from_millis(5)),
        ))
        .build()
        .expect("build failed");

    let began = Instant::now();
    coordinator.start();
    coordinator.wait().await;
    let wall = began.elapsed();

    assert!(wall >= Duration::from_millis(200));
    assert!(wall < Duration::from_millis(1000));

    let stats = drain(stats_rx).await;
    assert!(!stats.is_empty());
    assert!(stats.iter().all(|s| s.status == 204));
}

#[tokio::test]
async fn throttle_bounds_in_flight_attempts() {
    let (stats_tx, stats_rx) = mpsc::channel(1024);
    let inner = Arc::new(MockTransport::new(200).with_delay(Duration::from_millis(5)));

    let mut cfg = config(50, 8);
    cfg.max_rps = 2;

    let mut coordinator = CoordinatorBuilder::new()
        .config(cfg)
        .stats_tx(stats_tx)
        .transport(Arc::new(Throttled::new(2, SharedRef(Arc::clone(&inner)))))
        .build()
        .expect("build failed");

    coordinator.start();
    coordinator.wait().await;

    assert_eq!(drain(stats_rx).await.len(), 50);
    assert!(inner.peak() <= 2, "peak in-flight was {}", inner.peak());
}

/// Adapter so the throttle can wrap an `Arc`-shared inner transport the
/// test keeps a handle on.
struct SharedRef(Arc<MockTransport>);

#[async_trait]
impl Transport for SharedRef {
    async fn round_trip(
        &self,
        template: &RequestTemplate,
        trace: &mut TraceState,
    ) -> Result<Exchange, AttemptError> {
        self.0.round_trip(template, trace).await
    }
}

#[tokio::test]
async fn cancellation_stops_admission_and_drains() {
    let (stats_tx, stats_rx) = mpsc::channel(65536);
    let cancel = CancellationToken::new();

    let mut coordinator = CoordinatorBuilder::new()
        .config(config(50_000, 16))
        .stats_tx(stats_tx)
        .cancel(cancel.clone())
        .transport(Arc::new(
            MockTransport::new(200).with_delay(Duration::from_millis(2)),
        ))
        .build()
        .expect("build failed");

    coordinator.start();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    tokio::time::timeout(Duration::from_secs(5), coordinator.wait())
        .await
        .expect("wait did not return after cancellation");
    canceller.await.unwrap();

    let stats = drain(stats_rx).await;
    assert!(stats.len() < 50_000);
    // Attempts interrupted mid-flight (or drained after the cancel) carry
    // the Cancelled kind; everything else completed normally.
    for stat in stats.iter().filter(|s| !s.is_success()) {
        assert_eq!(stat.err.as_ref().unwrap().kind(), ErrorKind::Cancelled);
    }
}

#[tokio::test]
async fn stats_channel_closes_after_workers_exit() {
    let (stats_tx, mut stats_rx) = mpsc::channel(64);
    let mut coordinator = CoordinatorBuilder::new()
        .config(config(5, 2))
        .stats_tx(stats_tx)
        .transport(Arc::new(MockTransport::new(200)))
        .build()
        .expect("build failed");

    coordinator.start();
    coordinator.wait().await;

    // All senders are gone once wait() consumed the coordinator: the
    // receiver yields the buffered stats then None.
    let mut seen = 0;
    while let Some(_stat) = stats_rx.recv().await {
        seen += 1;
    }
    assert_eq!(seen, 5);
}
