//! Velocity tracking
//!
//! Keeps the delivered effort of finished iterations, oldest first, and
//! derives the commitment bounds used when planning the next one.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Average reported when no iteration has been recorded yet
pub const DEFAULT_VELOCITY: f64 = 25.0;

/// Default number of retained history entries
pub const DEFAULT_HISTORY_LIMIT: usize = 52;

/// Velocity statistics over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityReport {
    /// Mean delivered effort
    pub average: f64,
    /// Window that was requested
    pub window: usize,
    /// Entries that actually contributed to the average
    pub iterations_analyzed: usize,
    /// `floor(average * 0.9)`
    pub recommended: i64,
    /// `ceil(average * 1.1)`
    pub optimistic: i64,
}

/// Bounded history of delivered effort per iteration
#[derive(Debug)]
pub struct VelocityTracker {
    history: RwLock<VecDeque<u32>>,
    limit: usize,
}

impl VelocityTracker {
    /// Empty tracker with the default limit
    #[must_use]
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY_LIMIT, Vec::new())
    }

    /// Tracker pre-filled with `seed` (oldest first), keeping at most `limit`
    /// entries
    ///
    /// A zero limit is treated as one.
    #[must_use]
    pub fn with_history(limit: usize, seed: Vec<u32>) -> Self {
        let limit = limit.max(1);
        let skip = seed.len().saturating_sub(limit);
        let history: VecDeque<u32> = seed.into_iter().skip(skip).collect();
        Self {
            history: RwLock::new(history),
            limit,
        }
    }

    /// Append the delivered total of a finished iteration
    pub fn record_iteration_completion(&self, total: u32) {
        let mut history = self.history.write();
        history.push_back(total);
        while history.len() > self.limit {
            history.pop_front();
        }
    }

    /// Mean of the last `min(window, len)` entries, or
    /// [`DEFAULT_VELOCITY`] when that is zero entries
    #[must_use]
    pub fn average_velocity(&self, window: usize) -> f64 {
        self.window_stats(window).0
    }

    /// Full report for `window`
    #[must_use]
    pub fn report(&self, window: usize) -> VelocityReport {
        let (average, analyzed) = self.window_stats(window);
        VelocityReport {
            average,
            window,
            iterations_analyzed: analyzed,
            recommended: recommended_commitment(average),
            optimistic: optimistic_commitment(average),
        }
    }

    /// Copy of the history, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<u32> {
        self.history.read().iter().copied().collect()
    }

    /// Retention limit
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn window_stats(&self, window: usize) -> (f64, usize) {
        let history = self.history.read();
        let n = window.min(history.len());
        if n == 0 {
            return (DEFAULT_VELOCITY, 0);
        }
        let sum: u64 = history.iter().rev().take(n).map(|&v| u64::from(v)).sum();
        #[allow(clippy::cast_precision_loss)]
        let average = sum as f64 / n as f64;
        (average, n)
    }
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Conservative commitment: `floor(avg * 0.9)`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn recommended_commitment(avg: f64) -> i64 {
    (avg * 0.9).floor() as i64
}

/// Stretch commitment: `ceil(avg * 1.1)`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn optimistic_commitment(avg: f64) -> i64 {
    (avg * 1.1).ceil() as i64
}
