//! Prometheus plumbing for exposing [`SummarySnapshot`]s
//!
//! The `prometheus` crate has no summary type of its own, so this provides a
//! [`MetricVecBuilder`] whose metrics hold a snapshot computed elsewhere (by a [`super::Summary`])
//! and render it as a protobuf summary on collection.

use std::sync::Arc;

use parking_lot::RwLock;
use prometheus::{
    Opts,
    core::{Desc, Describer, Metric, MetricVec, MetricVecBuilder},
    proto as pp,
};

use crate::summary::SummarySnapshot;

/// A labeled family of [`SnapshotSummary`] series
pub type SummaryVec = MetricVec<SummaryVecBuilder>;

/// Create a [`SummaryVec`] with the given name, help and label names
pub fn summary_vec(name: &str, help: &str, label_names: &[&str]) -> prometheus::Result<SummaryVec> {
    let variable_names = label_names.iter().map(|s| (*s).to_owned()).collect();
    let opts = SummaryVecOpts { common_opts: Opts::new(name, help).variable_labels(variable_names) };

    MetricVec::create(pp::MetricType::SUMMARY, SummaryVecBuilder, opts)
}

/// Configuration options for [`SnapshotSummary`]
#[derive(Debug, Clone)]
pub struct SummaryVecOpts {
    pub common_opts: Opts,
}

// needed for MetricVecBuilder::P
impl Describer for SummaryVecOpts {
    fn describe(&self) -> prometheus::Result<Desc> {
        self.common_opts.describe()
    }
}

/// A summary series whose value is replaced wholesale with [`SnapshotSummary::set`]
///
/// Clones share the same snapshot, which is how [`MetricVec::with_label_values`] hands out
/// handles to the stored series.
#[derive(Debug, Clone)]
pub struct SnapshotSummary {
    label_pairs: Vec<pp::LabelPair>,
    snapshot: Arc<RwLock<SummarySnapshot>>,
}

impl SnapshotSummary {
    fn new<V: AsRef<str>>(opts: &SummaryVecOpts, label_values: &[V]) -> prometheus::Result<Self> {
        let desc = opts.common_opts.describe()?;
        let label_pairs = make_label_pairs(&desc, label_values)?;

        Ok(Self { label_pairs, snapshot: Arc::default() })
    }

    /// Replace the exposed snapshot
    pub fn set(&self, snapshot: SummarySnapshot) {
        *self.snapshot.write() = snapshot;
    }

    /// Make a protobuf summary out of the current snapshot
    pub fn proto(&self) -> pp::Summary {
        let snapshot = self.snapshot.read();
        let mut summary = pp::Summary::default();

        summary.set_sample_sum(snapshot.sum);
        summary.set_sample_count(snapshot.count);

        let mut quantiles = Vec::with_capacity(snapshot.quantiles.len());
        for (quantile, value) in snapshot.quantiles.iter().copied() {
            let mut q = pp::Quantile::default();
            q.set_quantile(quantile);
            q.set_value(value);
            quantiles.push(q);
        }

        summary.set_quantile(quantiles);

        summary
    }
}

impl Metric for SnapshotSummary {
    fn metric(&self) -> pp::Metric {
        let mut m = pp::Metric::from_label(self.label_pairs.clone());
        m.set_summary(self.proto());
        m
    }
}

/// Builds the [`SnapshotSummary`] series of a [`SummaryVec`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryVecBuilder;

impl MetricVecBuilder for SummaryVecBuilder {
    type M = SnapshotSummary;
    type P = SummaryVecOpts;

    fn build<V: AsRef<str>>(&self, opts: &Self::P, vals: &[V]) -> prometheus::Result<Self::M> {
        Self::M::new(opts, vals)
    }
}

// from prometheus::value::make_label_pairs
fn make_label_pairs<V: AsRef<str>>(
    desc: &Desc,
    label_values: &[V],
) -> prometheus::Result<Vec<pp::LabelPair>> {
    if desc.variable_labels.len() != label_values.len() {
        return Err(prometheus::Error::InconsistentCardinality {
            expect: desc.variable_labels.len(),
            got: label_values.len(),
        });
    }

    let total_len = desc.variable_labels.len() + desc.const_label_pairs.len();
    if total_len == 0 {
        return Ok(vec![]);
    }

    let mut label_pairs = Vec::with_capacity(total_len);
    for (name, value) in desc.variable_labels.iter().zip(label_values) {
        let mut label_pair = pp::LabelPair::default();
        label_pair.set_name(name.clone());
        label_pair.set_value(value.as_ref().to_owned());
        label_pairs.push(label_pair);
    }

    label_pairs.extend(desc.const_label_pairs.iter().cloned());
    label_pairs.sort();
    Ok(label_pairs)
}
