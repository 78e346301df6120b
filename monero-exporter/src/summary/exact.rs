//! Exact quantile stream
//!
//! Keeps every observation. Useful as a reference when checking the error bounds of
//! [`super::TargetedStream`], or for streams known to stay small.

use crate::summary::{Target, targeted::nearest_rank, traits::QuantileStream};

/// Retains all observations and answers nearest-rank quantiles exactly
#[derive(Debug, Clone, Default)]
pub struct ExactStream {
    values: Vec<f64>,
    sorted: bool,
}

impl QuantileStream for ExactStream {
    fn with_targets(_: &[Target]) -> Self {
        Self::default()
    }

    fn insert(&mut self, value: f64) {
        self.values.push(value);
        self.sorted = false;
    }

    fn query(&mut self, phi: f64) -> f64 {
        if self.values.is_empty() {
            return 0.;
        }

        if !self.sorted {
            self.values.sort_by(f64::total_cmp);
            self.sorted = true;
        }

        nearest_rank(&self.values, phi)
    }

    fn retained(&self) -> usize {
        self.values.len()
    }
}
