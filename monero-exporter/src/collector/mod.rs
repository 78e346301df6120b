//! Producers of daemon metrics, and the orchestrator running them on every scrape.
//!
//! A [`Producer`] fetches one area of the daemon's state and emits the metrics derived from it
//! into the scrape's [`Sink`]. Producers are built fresh for every scrape by their
//! [`ProducerFactory`], so they never carry state from one cycle to the next.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{
    context::ScrapeContext,
    country::{CountryError, CountryMapper},
    metric::{Metric, Sink},
    rpc::{DaemonClient, RpcError},
    summary::{Summary, SummaryOpts, SummarySnapshot},
};

mod orchestrator;
pub use orchestrator::{Orchestrator, ProducerFailure, Scrape, ScrapeOutcome};

pub mod producers;

/// Atomic units in one monero
pub const ATOMIC_UNITS_PER_XMR: f64 = 1e12;
/// Atomic units in one micronero
pub const ATOMIC_UNITS_PER_MICRO_XMR: f64 = 1e6;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("{step}: {source}")]
    Rpc { step: &'static str, source: RpcError },
    #[error("{step}: {source}")]
    Decode { step: &'static str, source: serde_json::Error },
    #[error("country of {host}: {source}")]
    Country { host: String, source: CountryError },
    #[error("task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CollectError {
    /// Wrap an [`RpcError`] raised by `step`, for use with [`Result::map_err`]
    pub fn rpc(step: &'static str) -> impl FnOnce(RpcError) -> Self {
        move |source| Self::Rpc { step, source }
    }

    /// Wrap a decoding error raised by `step`, for use with [`Result::map_err`]
    pub fn decode(step: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::Decode { step, source }
    }
}

/// A unit of collection work, run once per scrape
#[async_trait]
pub trait Producer: Send {
    /// Stable identifier, used in logs and telemetry labels
    fn name(&self) -> &'static str;

    /// Fetch data from the daemon and emit the metrics derived from it
    ///
    /// Metrics emitted before an error is returned are kept.
    async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError>;
}

/// What a producer is built from
#[derive(Debug, Clone)]
pub struct ProducerDeps {
    pub client: Arc<dyn DaemonClient>,
    pub sink: Sink,
    pub summary: SummaryOpts,
    pub countries: Arc<dyn CountryMapper>,
}

/// Summarize `values` using the targets in `opts`
pub fn summarize(opts: &SummaryOpts, values: impl IntoIterator<Item = f64>) -> SummarySnapshot {
    let mut summary: Summary = Summary::with_opts(opts);
    summary.extend(values);
    summary.snapshot()
}

type BuildFn = dyn Fn(&ProducerDeps) -> Box<dyn Producer> + Send + Sync;

/// Builds a fresh [`Producer`] for every scrape
pub struct ProducerFactory {
    name: &'static str,
    build: Box<BuildFn>,
}

impl ProducerFactory {
    pub fn new<F, P>(name: &'static str, build: F) -> Self
    where
        F: Fn(&ProducerDeps) -> P + Send + Sync + 'static,
        P: Producer + 'static,
    {
        Self { name, build: Box::new(move |deps| Box::new(build(deps))) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn build(&self, deps: &ProducerDeps) -> Box<dyn Producer> {
        (self.build)(deps)
    }
}

impl fmt::Debug for ProducerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProducerFactory").field(&self.name).finish()
    }
}

/// Every producer the exporter ships, in the order they are spawned
pub fn default_producers() -> Vec<ProducerFactory> {
    use producers::*;

    vec![
        ProducerFactory::new("overall", OverallProducer::new),
        ProducerFactory::new("connections", ConnectionsProducer::new),
        ProducerFactory::new("peerlist", PeerListProducer::new),
        ProducerFactory::new("lastblock", LastBlockProducer::new),
        ProducerFactory::new("transaction_pool", TransactionPoolProducer::new),
        ProducerFactory::new("net", NetStatsProducer::new),
        ProducerFactory::new("rpc", RpcProducer::new),
        ProducerFactory::new("fee_estimate", FeeEstimateProducer::new),
        ProducerFactory::new("bans", BansProducer::new),
    ]
}

/// A gauge derived from a field of an RPC result
#[derive(Debug, Clone, Copy)]
pub struct GaugeField<T> {
    pub name: &'static str,
    pub help: &'static str,
    pub value: fn(&T) -> f64,
}

impl<T> GaugeField<T> {
    pub const fn new(name: &'static str, help: &'static str, value: fn(&T) -> f64) -> Self {
        Self { name, help, value }
    }
}

/// Emit one gauge per row of `table`, read from `source`
pub fn emit_gauges<T>(sink: &Sink, table: &[GaugeField<T>], source: &T) {
    for field in table {
        sink.emit(Metric::gauge(field.name, field.help, (field.value)(source)));
    }
}

pub(crate) fn flag(value: bool) -> f64 {
    if value { 1. } else { 0. }
}
