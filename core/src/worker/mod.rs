//! Worker: the attempt execution loop
//!
//! A worker pulls prepared requests off the shared queue, issues each one
//! through the transport with a fresh trace record and an optional
//! per-attempt deadline, drains the response body, and publishes exactly
//! one [`Stat`](crate::Stat) per dequeued request. Workers exit when the
//! queue is closed and drained; cancellation surfaces as `Cancelled` stats
//! rather than skipped work.

mod executor;

pub use executor::Worker;
