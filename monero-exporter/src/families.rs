//! Turns the metrics drained from a scrape into Prometheus metric families
//!
//! Every scrape gets its own [`prometheus::Registry`]: series only live as long as the scrape that
//! produced them, so a series that is missing from a cycle is simply absent from the output.

use std::collections::HashMap;

use prometheus::{CounterVec, GaugeVec, Opts, Registry, proto as pp};
use tracing::warn;

use crate::{
    metric::{Metric, MetricValue},
    summary::{SummaryVec, summary_vec},
};

#[derive(Clone)]
enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
    Summary(SummaryVec),
}

impl Family {
    fn new(metric: &Metric) -> prometheus::Result<Self> {
        let labels = metric.label_names();
        let opts = || Opts::new(metric.name, metric.help);

        Ok(match metric.value {
            MetricValue::Gauge(_) => Self::Gauge(GaugeVec::new(opts(), &labels)?),
            MetricValue::Counter(_) => Self::Counter(CounterVec::new(opts(), &labels)?),
            MetricValue::Summary(_) => Self::Summary(summary_vec(metric.name, metric.help, &labels)?),
        })
    }

    fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        match self {
            Self::Gauge(vec) => registry.register(Box::new(vec.clone())),
            Self::Counter(vec) => registry.register(Box::new(vec.clone())),
            Self::Summary(vec) => registry.register(Box::new(vec.clone())),
        }
    }

    fn record(&self, metric: Metric) -> prometheus::Result<()> {
        let values: Vec<&str> = metric.labels.iter().map(|(_, v)| v.as_str()).collect();

        match (self, metric.value) {
            (Self::Gauge(vec), MetricValue::Gauge(v)) => {
                vec.get_metric_with_label_values(values.as_slice())?.set(v);
            }
            (Self::Counter(vec), MetricValue::Counter(v)) => {
                let counter = vec.get_metric_with_label_values(values.as_slice())?;
                counter.reset();
                counter.inc_by(v);
            }
            (Self::Summary(vec), MetricValue::Summary(snapshot)) => {
                vec.get_metric_with_label_values(values.as_slice())?.set(snapshot);
            }
            _ => {
                return Err(prometheus::Error::Msg(format!(
                    "metric {} emitted with a different type than its first sample",
                    metric.name
                )));
            }
        }

        Ok(())
    }
}

/// Group metrics by name into encodable metric families
///
/// The first metric seen for a name decides the family's help, type and label names. Metrics that
/// don't fit their family are logged and skipped; a later duplicate of a series replaces it.
pub fn gather(metrics: Vec<Metric>) -> Vec<pp::MetricFamily> {
    let registry = Registry::new();
    let mut families: HashMap<&'static str, Option<Family>> = HashMap::new();

    for metric in metrics {
        let name = metric.name;
        let family = families.entry(name).or_insert_with(|| {
            let family = Family::new(&metric).and_then(|f| f.register(&registry).map(|_| f));
            family.inspect_err(|err| warn!(metric = name, %err, "invalid metric family")).ok()
        });

        let Some(family) = family else { continue };
        if let Err(err) = family.record(metric) {
            warn!(metric = name, %err, "dropping metric");
        }
    }

    registry.gather()
}
