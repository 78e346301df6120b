//! Targeted quantile stream
//!
//! Implements the biased-quantile algorithm from Cormode, Korn, Muthukrishnan and Srivastava,
//! "Effective Computation of Biased Quantiles over Data Streams", restricted to a set of target
//! quantiles. Each target `(phi, epsilon)` bounds the rank error of queries for `phi` to
//! `epsilon * n`, while the sample list stays `O((1/epsilon) log(epsilon n))` in size.
//!
//! Observations are buffered and merged in sorted batches, which keeps inserts amortized cheap.

use crate::summary::{Target, traits::QuantileStream};

/// Number of observations buffered before they're merged into the sample list
pub const DEFAULT_BUFFER_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    /// Difference between the lowest possible rank of this sample and the previous one
    width: f64,
    /// Difference between the highest and lowest possible rank of this sample
    delta: f64,
}

/// Bounded-memory stream answering rank queries for a fixed set of target quantiles
#[derive(Debug, Clone)]
pub struct TargetedStream {
    targets: Vec<Target>,

    buffer: Vec<f64>,
    sorted: bool,

    n: f64,
    samples: Vec<Sample>,
}

impl TargetedStream {
    /// The error allowed around rank `r` given the current stream length, the tightest bound
    /// across all targets
    fn invariant(&self, r: f64) -> f64 {
        let n = self.n;

        self.targets
            .iter()
            .map(|target| {
                if target.quantile * n <= r {
                    (2. * target.epsilon * r) / target.quantile
                } else {
                    (2. * target.epsilon * (n - r)) / (1. - target.quantile)
                }
            })
            // NaN bounds (0/0 at the edges) never win
            .fold(f64::MAX, f64::min)
    }

    fn sort_buffer(&mut self) {
        if !self.sorted {
            self.buffer.sort_by(f64::total_cmp);
            self.sorted = true;
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        self.sort_buffer();
        let buffer = std::mem::take(&mut self.buffer);
        self.merge(&buffer);

        // keep the allocation around for the next batch
        self.buffer = buffer;
        self.buffer.clear();
    }

    /// Merges a sorted batch of observations into the sample list
    fn merge(&mut self, batch: &[f64]) {
        let mut r = 0.;
        let mut i = 0;

        for &value in batch {
            let mut inserted = false;

            while i < self.samples.len() {
                let current = self.samples[i];
                if current.value > value {
                    let delta = (self.invariant(r).floor() - 1.).max(0.);
                    self.samples.insert(i, Sample { value, width: 1., delta });
                    i += 1;
                    inserted = true;
                    break;
                }

                r += current.width;
                i += 1;
            }

            if !inserted {
                self.samples.push(Sample { value, width: 1., delta: 0. });
                i += 1;
            }

            self.n += 1.;
            r += 1.;
        }

        self.compress();
    }

    /// Collapses adjacent samples whose combined rank uncertainty still satisfies the invariant
    fn compress(&mut self) {
        if self.samples.len() < 2 {
            return;
        }

        let mut xi = self.samples.len() - 1;
        let mut x = self.samples[xi];
        let mut r = self.n - 1. - x.width;

        let mut i = xi;
        while i > 0 {
            i -= 1;
            let current = self.samples[i];

            if current.width + x.width + x.delta <= self.invariant(r) {
                x.width += current.width;
                self.samples[xi] = x;
                self.samples.remove(i);
                xi -= 1;
            } else {
                x = current;
                xi = i;
            }

            r -= current.width;
        }
    }

    fn query_samples(&self, phi: f64) -> f64 {
        let t = (phi * self.n).ceil();
        let t = t + (self.invariant(t) / 2.).ceil();

        let mut previous = self.samples[0];
        let mut r = 0.;
        for &current in &self.samples[1..] {
            r += previous.width;
            if r + current.width + current.delta > t {
                return previous.value;
            }
            previous = current;
        }

        previous.value
    }
}

impl QuantileStream for TargetedStream {
    fn with_targets(targets: &[Target]) -> Self {
        Self {
            targets: targets.to_vec(),
            buffer: Vec::with_capacity(DEFAULT_BUFFER_CAPACITY),
            sorted: true,
            n: 0.,
            samples: Vec::new(),
        }
    }

    fn insert(&mut self, value: f64) {
        self.buffer.push(value);
        self.sorted = false;

        if self.buffer.len() >= DEFAULT_BUFFER_CAPACITY {
            self.flush();
        }
    }

    fn query(&mut self, phi: f64) -> f64 {
        if self.samples.is_empty() {
            // Nothing merged yet: the buffer holds every observation, answer exactly.
            if self.buffer.is_empty() {
                return 0.;
            }

            self.sort_buffer();
            return nearest_rank(&self.buffer, phi);
        }

        self.flush();
        self.query_samples(phi)
    }

    fn retained(&self) -> usize {
        self.samples.len() + self.buffer.len()
    }
}

/// Nearest-rank quantile of a sorted, non-empty slice
pub(crate) fn nearest_rank(sorted: &[f64], phi: f64) -> f64 {
    let idx = (sorted.len() as f64 * phi).ceil() as usize;
    let idx = idx.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}
