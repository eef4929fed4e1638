//! Failed-attempt grouping

use std::collections::HashMap;

use crate::error::ErrorKind;

/// Groups failed attempts by [`ErrorKind`].
///
/// Dumping every error verbatim makes long runs unreadable; buckets with
/// counts keep the output bounded while still telling timeouts apart from
/// refused connections. Owned by the collector's consumer task, so plain
/// counts suffice.
#[derive(Debug, Default)]
pub struct ErrorGrouper {
    counts: HashMap<ErrorKind, u64>,
}

impl ErrorGrouper {
    /// Create an empty grouper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failed attempt.
    pub fn record(&mut self, kind: ErrorKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }

    /// Failures recorded for one kind.
    pub fn get(&self, kind: ErrorKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Total failures across all kinds.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

impl std::fmt::Display for ErrorGrouper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Total: {}:", self.total())?;
        for (index, kind) in ErrorKind::ALL.iter().enumerate() {
            let separator = if index == 0 { " " } else { ", " };
            write!(f, "{separator}{kind}({})", self.get(*kind))?;
        }
        Ok(())
    }
}
