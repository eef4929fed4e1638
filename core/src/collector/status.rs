//! Response status code accounting

use std::collections::BTreeMap;

/// Counts responses per status code.
///
/// Owned by the collector's consumer task; the ordered map keeps the
/// rendered breakdown deterministic.
#[derive(Debug, Default)]
pub struct StatusCodeCounter {
    counts: BTreeMap<u16, u64>,
}

impl StatusCodeCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one response with the given status code.
    pub fn increment(&mut self, code: u16) {
        *self.counts.entry(code).or_insert(0) += 1;
    }

    /// Total responses recorded across all codes.
    pub fn count(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Responses recorded for one code.
    pub fn get(&self, code: u16) -> u64 {
        self.counts.get(&code).copied().unwrap_or(0)
    }

    /// Whether anything has been recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl std::fmt::Display for StatusCodeCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Breakdown")?;
        for (code, count) in &self.counts {
            writeln!(f, "\t[{code}]: {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_per_code() {
        let mut counter = StatusCodeCounter::new();
        for _ in 0..3 {
            counter.increment(200);
        }
        counter.increment(500);

        assert_eq!(counter.get(200), 3);
        assert_eq!(counter.get(500), 1);
        assert_eq!(counter.get(404), 0);
        assert_eq!(counter.count(), 4);
    }

    #[test]
    fn display_lists_each_code_once() {
        let mut counter = StatusCodeCounter::new();
        counter.increment(500);
        counter.increment(200);
        counter.increment(200);

        let rendered = counter.to_string();
        assert!(rendered.contains("Breakdown"));
        assert!(rendered.contains("[200]: 2"));
        assert!(rendered.contains("[500]: 1"));
        // Ordered map: 200 precedes 500.
        assert!(rendered.find("[200]").unwrap() < rendered.find("[500]").unwrap());
    }
}
