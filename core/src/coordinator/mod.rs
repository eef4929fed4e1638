//! Coordinator: workload admission and lifecycle
//!
//! The coordinator owns the run: it spawns the worker pool, feeds it
//! through a bounded queue under the configured termination policy (a
//! fixed request count or a wall-clock duration), and guarantees a clean
//! drain — the queue closes exactly once, every worker exits, and only
//! then does the stats channel close.
//!
//! ```ignore
//! let (stats_tx, stats_rx) = collector::stats_channel();
//! let mut coordinator = CoordinatorBuilder::new()
//!     .config(cfg)
//!     .stats_tx(stats_tx)
//!     .cancel(token)
//!     .build()?;
//!
//! coordinator.start();
//! coordinator.wait().await;
//! ```

mod builder;
mod executor;

pub use builder::CoordinatorBuilder;
pub use executor::Coordinator;

#[cfg(test)]
mod tests;
