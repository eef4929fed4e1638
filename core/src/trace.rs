//! Per-attempt transport phase timing
//!
//! `TraceState` is the explicit, worker-owned replacement for request-scoped
//! trace callbacks: the transport is handed `&mut TraceState` for the
//! attempt and stamps phase boundaries directly as it resolves, connects,
//! and hands out a connection. No synchronisation is involved; the state
//! never leaves the owning worker.

use std::time::{Duration, Instant};

/// Phase start times and accumulated spans for one attempt.
///
/// Spans accumulate rather than overwrite so an attempt that dials more than
/// once (a cross-origin redirect) reports its total time in each phase. A
/// `*_done` without a matching `*_start` leaves that span untouched — a
/// reused connection legitimately has no DNS, connect, or TLS phase.
#[derive(Debug, Default)]
pub struct TraceState {
    dns_started: Option<Instant>,
    connect_started: Option<Instant>,
    tls_started: Option<Instant>,
    get_conn_started: Option<Instant>,

    dns: Duration,
    connect: Duration,
    tls: Duration,
    get_conn: Duration,
    reused: bool,
}

impl TraceState {
    /// Mark the start of name resolution.
    pub fn dns_start(&mut self) {
        self.dns_started = Some(Instant::now());
    }

    /// Mark the end of name resolution.
    pub fn dns_done(&mut self) {
        if let Some(started) = self.dns_started.take() {
            self.dns += started.elapsed();
        }
    }

    /// Mark the start of the TCP connect.
    pub fn connect_start(&mut self) {
        self.connect_started = Some(Instant::now());
    }

    /// Mark the end of the TCP connect.
    pub fn connect_done(&mut self) {
        if let Some(started) = self.connect_started.take() {
            self.connect += started.elapsed();
        }
    }

    /// Mark the start of the TLS handshake.
    pub fn tls_start(&mut self) {
        self.tls_started = Some(Instant::now());
    }

    /// Mark the end of the TLS handshake.
    pub fn tls_done(&mut self) {
        if let Some(started) = self.tls_started.take() {
            self.tls += started.elapsed();
        }
    }

    /// Mark the start of connection acquisition.
    pub fn get_conn(&mut self) {
        self.get_conn_started = Some(Instant::now());
    }

    /// Mark connection acquisition complete, recording whether the
    /// connection came from the pool.
    pub fn got_conn(&mut self, reused: bool) {
        if let Some(started) = self.get_conn_started.take() {
            self.get_conn += started.elapsed();
        }
        self.reused = reused;
    }

    /// Accumulated DNS time.
    pub fn dns(&self) -> Duration {
        self.dns
    }

    /// Accumulated TCP connect time.
    pub fn connect(&self) -> Duration {
        self.connect
    }

    /// Accumulated TLS handshake time.
    pub fn tls(&self) -> Duration {
        self.tls
    }

    /// Accumulated connection acquisition time.
    pub fn get_conn_time(&self) -> Duration {
        self.get_conn
    }

    /// Whether the last acquired connection was reused.
    pub fn reused(&self) -> bool {
        self.reused
    }
}
