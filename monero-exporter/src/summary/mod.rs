//! Streaming summaries over per-scrape observations
//!
//! A [`Summary`] tracks the exact count and sum of the values inserted into it, plus a
//! bounded-memory [`QuantileStream`] answering approximate quantile queries for a configured set
//! of [`Target`]s.
//!
//! Summaries are meant to be short lived: build one per distribution, insert every observation,
//! then query. Quantiles are computed on the first query and cached from then on, so inserting
//! after querying is not supported (the cached values would go stale).

use std::{fmt, str::FromStr};

mod exact;
mod targeted;
mod traits;
mod vec;

pub use exact::ExactStream;
pub use targeted::{DEFAULT_BUFFER_CAPACITY, TargetedStream};
pub use traits::QuantileStream;
pub use vec::{SnapshotSummary, SummaryVec, SummaryVecBuilder, SummaryVecOpts, summary_vec};

/// A quantile to track along with the rank error tolerated when answering it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    /// The quantile, in `[0, 1]`
    pub quantile: f64,
    /// Allowed absolute rank error, as a fraction of the stream length
    pub epsilon: f64,
}

impl Target {
    pub const fn new(quantile: f64, epsilon: f64) -> Self {
        Self { quantile, epsilon }
    }
}

/// Targets used unless [`SummaryOpts`] overrides them
pub const DEFAULT_TARGETS: &[Target] = &[
    Target::new(0.05, 0.01),
    Target::new(0.10, 0.01),
    Target::new(0.25, 0.01),
    Target::new(0.50, 0.01),
    Target::new(0.75, 0.01),
    Target::new(0.90, 0.01),
    Target::new(0.95, 0.01),
    Target::new(0.99, 0.01),
    Target::new(1.00, 0.01),
];

/// Error returned when parsing a [`Target`] from its `quantile:epsilon` form
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TargetParseError {
    #[error("expected `quantile:epsilon`, got {0:?}")]
    Format(String),
    #[error("invalid number {0:?}")]
    Number(String),
    #[error("quantile {0} outside [0, 1]")]
    Quantile(f64),
    #[error("epsilon {0} outside (0, 1)")]
    Epsilon(f64),
}

impl FromStr for Target {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (quantile, epsilon) =
            s.split_once(':').ok_or_else(|| TargetParseError::Format(s.to_owned()))?;

        let parse = |v: &str| {
            v.trim().parse::<f64>().map_err(|_| TargetParseError::Number(v.trim().to_owned()))
        };
        let target = Self::new(parse(quantile)?, parse(epsilon)?);
        target.validate()?;

        Ok(target)
    }
}

impl Target {
    /// Check that the quantile and epsilon are in range
    pub fn validate(&self) -> Result<(), TargetParseError> {
        if !(0.0..=1.0).contains(&self.quantile) {
            return Err(TargetParseError::Quantile(self.quantile));
        }
        if !(self.epsilon > 0. && self.epsilon < 1.) {
            return Err(TargetParseError::Epsilon(self.epsilon));
        }

        Ok(())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.quantile, self.epsilon)
    }
}

/// Configuration options for [`Summary`]
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOpts {
    /// Which quantiles to track, and how precisely
    pub targets: Vec<Target>,
}

impl Default for SummaryOpts {
    fn default() -> Self {
        Self { targets: DEFAULT_TARGETS.to_vec() }
    }
}

impl SummaryOpts {
    /// Configure the targets to track
    pub fn targets<B: Into<Vec<Target>>>(self, targets: B) -> Self {
        Self { targets: targets.into() }
    }
}

/// Count, sum and quantiles of a [`Summary`], frozen
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummarySnapshot {
    pub count: u64,
    pub sum: f64,
    /// `(quantile, value)` pairs, in target order
    pub quantiles: Vec<(f64, f64)>,
}

/// An append-only summary over a stream of observations
///
/// Count and sum are exact; quantiles are estimated by the [`QuantileStream`] `S`.
///
/// # Preconditions
/// - Observations must be finite. NaN or infinite values make quantile results meaningless.
/// - All inserts must happen before the first quantile query.
#[derive(Debug, Clone)]
pub struct Summary<S = TargetedStream> {
    count: u64,
    sum: f64,

    targets: Vec<Target>,
    stream: S,

    computed: Option<Vec<(f64, f64)>>,
}

impl Summary {
    /// Create a summary tracking [`DEFAULT_TARGETS`]
    pub fn new() -> Self {
        Self::with_opts(&SummaryOpts::default())
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: QuantileStream> Summary<S> {
    pub fn with_opts(opts: &SummaryOpts) -> Self {
        Self {
            count: 0,
            sum: 0.,
            targets: opts.targets.clone(),
            stream: S::with_targets(&opts.targets),
            computed: None,
        }
    }

    /// Record a given observation in the summary.
    pub fn insert(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.stream.insert(value);
    }

    /// Number of observations inserted so far
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of all observations inserted so far
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Values for every configured target, computed on first call
    pub fn quantiles(&mut self) -> &[(f64, f64)] {
        let Self { targets, stream, computed, .. } = self;

        computed.get_or_insert_with(|| {
            targets.iter().map(|target| (target.quantile, stream.query(target.quantile))).collect()
        })
    }

    /// Estimate the value at quantile `phi`
    ///
    /// Configured targets are answered from the cached [`Self::quantiles`]; any other `phi` is
    /// queried from the stream, which honors the tolerance of the nearest tracked targets only.
    pub fn quantile_value(&mut self, phi: f64) -> f64 {
        if let Some(&(_, value)) = self.quantiles().iter().find(|(q, _)| *q == phi) {
            return value;
        }

        self.stream.query(phi)
    }

    /// Freeze count, sum and quantiles
    pub fn snapshot(&mut self) -> SummarySnapshot {
        let quantiles = self.quantiles().to_vec();
        SummarySnapshot { count: self.count, sum: self.sum, quantiles }
    }

    /// Number of samples the underlying stream keeps in memory
    pub fn retained(&self) -> usize {
        self.stream.retained()
    }
}

impl<S: QuantileStream> Extend<f64> for Summary<S> {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}
