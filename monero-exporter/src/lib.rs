//! Prometheus exporter for monero daemons. Every scrape fans out to a set of producers, each
//! fetching part of the daemon's state over RPC and deriving metrics from it.
//! - [`collector::Orchestrator`]: runs the producers concurrently under a scrape deadline.
//! - [`summary::Summary`]: bounded-memory quantile summaries over per-scrape observations.
//! - [`rpc::DaemonClient`]: the daemon RPC calls producers rely on.
//! - [`exporter::ExporterBuilder`]: serves the scrape results over HTTP.

pub mod collector;
pub mod config;
pub mod context;
pub mod country;
pub mod families;
pub mod metric;
pub mod rpc;
pub mod summary;
pub mod telemetry;

#[cfg(feature = "exporter")]
pub mod exporter;

pub use collector::{Orchestrator, Scrape, ScrapeOutcome, default_producers};
pub use config::{Config, ScrapeConfig};
pub use context::ScrapeContext;
pub use metric::{Metric, MetricValue};
pub use summary::{Summary, SummaryOpts, Target};
