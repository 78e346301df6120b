use crate::summary::Target;

/// Abstracts over the estimator a [`crate::summary::Summary`] uses to answer quantile queries
pub trait QuantileStream {
    /// Create an empty stream tracking the given targets
    fn with_targets(targets: &[Target]) -> Self;

    /// Add a new observation to the stream
    fn insert(&mut self, value: f64);

    /// Estimate the value found at quantile `phi`, `0` for an empty stream
    ///
    /// Takes `&mut self` so implementations can fold pending observations in before answering.
    fn query(&mut self, phi: f64) -> f64;

    /// Number of samples currently held in memory
    fn retained(&self) -> usize;
}
