//! Simulation metrics.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

/// Counts of exchange operations run by a simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationMetrics {
    /// Orders placed.
    pub orders_created: u64,
    /// Orders filled.
    pub orders_filled: u64,
    /// Orders cancelled.
    pub orders_cancelled: u64,
    /// Rejected operations by error code.
    pub rejected: BTreeMap<&'static str, u64>,
    /// Fill latency samples (µs).
    #[serde(skip)]
    latency_samples: VecDeque<u64>,
    #[serde(skip)]
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            orders_created: 0,
            orders_filled: 0,
            orders_cancelled: 0,
            rejected: BTreeMap::new(),
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a placed order.
    pub fn record_created(&mut self) {
        self.orders_created += 1;
    }

    /// Record a fill and how long it took.
    pub fn record_fill(&mut self, latency_us: u64) {
        self.orders_filled += 1;

        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_us);
    }

    /// Record a cancelled order.
    pub fn record_cancel(&mut self) {
        self.orders_cancelled += 1;
    }

    /// Record a rejected operation under its error code.
    pub fn record_rejection(&mut self, code: &'static str) {
        *self.rejected.entry(code).or_insert(0) += 1;
    }

    /// Total rejected operations.
    pub fn total_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }

    /// Rejections with the given code.
    pub fn rejected_with(&self, code: &str) -> u64 {
        self.rejected.get(code).copied().unwrap_or(0)
    }

    /// Average fill latency in µs.
    pub fn average_fill_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// p99 fill latency in µs.
    pub fn p99_fill_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * 99 / 100).min(sorted.len() - 1);
        sorted[idx]
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_created();
        metrics.record_created();
        metrics.record_fill(100);
        metrics.record_fill(200);
        metrics.record_fill(150);
        metrics.record_cancel();
        metrics.record_rejection("ALREADY_CLOSED");
        metrics.record_rejection("ALREADY_CLOSED");
        metrics.record_rejection("UNAUTHORIZED");

        assert_eq!(metrics.orders_created, 2);
        assert_eq!(metrics.orders_filled, 3);
        assert_eq!(metrics.orders_cancelled, 1);
        assert_eq!(metrics.total_rejected(), 3);
        assert_eq!(metrics.rejected_with("ALREADY_CLOSED"), 2);
        assert_eq!(metrics.rejected_with("NOT_FOUND"), 0);
        assert_eq!(metrics.average_fill_latency_us(), 150);
        assert_eq!(metrics.p99_fill_latency_us(), 200);
    }
}
