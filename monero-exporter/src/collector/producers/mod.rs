//! The producers shipped with the exporter, one per area of the daemon's state.

mod bans;
pub use bans::BansProducer;

mod connections;
pub use connections::ConnectionsProducer;

mod fee_estimate;
pub use fee_estimate::FeeEstimateProducer;

mod lastblock;
pub use lastblock::{LastBlockProducer, transaction_weight};

mod netstats;
pub use netstats::NetStatsProducer;

mod overall;
pub use overall::OverallProducer;

mod peers;
pub use peers::PeerListProducer;

mod rpc;
pub use rpc::RpcProducer;

mod transaction_pool;
pub use transaction_pool::TransactionPoolProducer;

/// Fee per kilobyte in micronero, or `None` for an empty transaction
fn fee_per_kb(fee: u64, size: u64) -> Option<f64> {
    if size == 0 {
        return None;
    }

    let fee = fee as f64 / super::ATOMIC_UNITS_PER_MICRO_XMR;
    Some(fee / (size as f64 / 1024.))
}

/// Seconds elapsed since the unix timestamp `then`
fn seconds_since(now: chrono::DateTime<chrono::Utc>, then: i64) -> f64 {
    (now.timestamp() - then) as f64
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{sync::Arc, time::Duration};

    use crate::{
        collector::ProducerDeps,
        context::ScrapeContext,
        country::{CountryMapper, UnknownCountry},
        metric::{Metric, MetricValue, Sink, SinkReceiver},
        rpc::{MockDaemonClient, RpcError},
        summary::{SummaryOpts, SummarySnapshot},
    };

    pub(crate) fn deps(client: MockDaemonClient) -> (ProducerDeps, SinkReceiver) {
        deps_with_countries(client, Arc::new(UnknownCountry))
    }

    pub(crate) fn deps_with_countries(
        client: MockDaemonClient,
        countries: Arc<dyn CountryMapper>,
    ) -> (ProducerDeps, SinkReceiver) {
        let (sink, rx) = Sink::channel();
        let deps =
            ProducerDeps { client: Arc::new(client), sink, summary: SummaryOpts::default(), countries };
        (deps, rx)
    }

    pub(crate) fn ctx() -> ScrapeContext {
        ScrapeContext::new(Duration::from_secs(5))
    }

    pub(crate) fn unavailable() -> RpcError {
        RpcError::Rpc { code: -1, message: "daemon unavailable".into() }
    }

    pub(crate) fn find<'a>(metrics: &'a [Metric], name: &str) -> &'a Metric {
        metrics
            .iter()
            .find(|m| m.name == name)
            .unwrap_or_else(|| panic!("metric {name} not emitted"))
    }

    pub(crate) fn gauge(metrics: &[Metric], name: &str) -> f64 {
        match find(metrics, name).value {
            MetricValue::Gauge(v) => v,
            ref other => panic!("{name} is not a gauge: {other:?}"),
        }
    }

    pub(crate) fn counter(metrics: &[Metric], name: &str, method: &str) -> f64 {
        let metric = metrics
            .iter()
            .find(|m| m.name == name && m.label("method") == Some(method))
            .unwrap_or_else(|| panic!("metric {name}{{method={method}}} not emitted"));
        match metric.value {
            MetricValue::Counter(v) => v,
            ref other => panic!("{name} is not a counter: {other:?}"),
        }
    }

    pub(crate) fn summary<'a>(metrics: &'a [Metric], name: &str) -> &'a SummarySnapshot {
        match &find(metrics, name).value {
            MetricValue::Summary(snapshot) => snapshot,
            other => panic!("{name} is not a summary: {other:?}"),
        }
    }

    pub(crate) fn quantile(snapshot: &SummarySnapshot, phi: f64) -> f64 {
        snapshot
            .quantiles
            .iter()
            .find(|(q, _)| *q == phi)
            .map(|(_, v)| *v)
            .unwrap_or_else(|| panic!("quantile {phi} missing"))
    }
}
