//! Metric values emitted by producers, and the sink they are written to.

use tokio::sync::mpsc;

use crate::summary::SummarySnapshot;

/// The value carried by a [`Metric`]
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// An instantaneous value
    Gauge(f64),
    /// A monotonically increasing value
    Counter(f64),
    /// A distribution summary
    Summary(SummarySnapshot),
}

/// A single sample for a series, identified by its name and labels
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: MetricValue,
}

impl Metric {
    pub fn gauge(name: &'static str, help: &'static str, value: f64) -> Self {
        Self { name, help, labels: Vec::new(), value: MetricValue::Gauge(value) }
    }

    pub fn counter(name: &'static str, help: &'static str, value: f64) -> Self {
        Self { name, help, labels: Vec::new(), value: MetricValue::Counter(value) }
    }

    pub fn summary(name: &'static str, help: &'static str, snapshot: SummarySnapshot) -> Self {
        Self { name, help, labels: Vec::new(), value: MetricValue::Summary(snapshot) }
    }

    /// Attach a label to this metric
    pub fn with_label(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.labels.push((key, value.into()));
        self
    }

    /// Value of the label named `key`, if any
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    /// Label keys, in the order they were attached
    pub fn label_names(&self) -> Vec<&'static str> {
        self.labels.iter().map(|(k, _)| *k).collect()
    }

    /// Label values, in the order they were attached
    pub fn label_values(&self) -> Vec<&str> {
        self.labels.iter().map(|(_, v)| v.as_str()).collect()
    }
}

/// The write half of a scrape's metric channel, shared by every producer of the cycle
#[derive(Debug, Clone)]
pub struct Sink {
    tx: mpsc::UnboundedSender<Metric>,
}

/// The read half of a scrape's metric channel
#[derive(Debug)]
pub struct SinkReceiver {
    rx: mpsc::UnboundedReceiver<Metric>,
}

impl Sink {
    pub fn channel() -> (Self, SinkReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, SinkReceiver { rx })
    }

    /// Write a metric to the sink
    ///
    /// Metrics emitted after the receiver is gone (a producer outliving its scrape) are dropped.
    pub fn emit(&self, metric: Metric) {
        let _ = self.tx.send(metric);
    }
}

impl SinkReceiver {
    /// Take every metric written so far, without waiting for writers still running
    pub fn drain(&mut self) -> Vec<Metric> {
        let mut metrics = Vec::new();
        while let Ok(metric) = self.rx.try_recv() {
            metrics.push(metric);
        }
        metrics
    }
}
