//! Load-generation engine for vessel
//!
//! This crate provides the request pipeline behind the `vessel` HTTP
//! benchmarking tool:
//!
//! - Workload configuration and the prepared request template
//! - A pooled HTTP(S) transport with per-phase trace capture
//! - The coordinator/worker pipeline driving the workload
//! - Stat collection, latency histogram, and the final summary
//!
//! The flow is: [`Coordinator`] admits work onto a bounded queue, workers
//! issue attempts through a [`Transport`] (optionally throttled), and every
//! attempt produces exactly one [`Stat`] consumed by the [`EventCollector`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod stat;
pub mod template;
pub mod trace;
pub mod transport;
pub mod worker;

pub use collector::EventCollector;
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use error::{AttemptError, Error, ErrorKind, Result};
pub use stat::Stat;
pub use template::RequestTemplate;
pub use trace::TraceState;
pub use transport::{HttpClient, Throttled, Transport};

/// User-agent identifier appended to every request the tool sends.
pub const TOOL_AGENT: &str = concat!("vessel/", env!("CARGO_PKG_VERSION"));
