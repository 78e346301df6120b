use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use monero_exporter::{
    Config, Orchestrator, ScrapeConfig, config, default_producers, exporter::ExporterBuilder,
    rpc::HttpDaemonClient, telemetry::ExporterMetrics,
};
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

/// Prometheus exporter for monero daemons
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address of monerod's RPC server
    #[arg(long, default_value = config::DEFAULT_MONEROD_ADDRESS)]
    monerod_address: String,

    /// Address to serve metrics on
    #[arg(long, default_value = config::DEFAULT_BIND_ADDRESS)]
    bind_address: String,

    /// Path under which metrics are served
    #[arg(long, default_value = config::DEFAULT_TELEMETRY_PATH)]
    telemetry_path: String,

    /// Seconds a scrape may take before producers still running are abandoned
    #[arg(long, default_value_t = 60)]
    scrape_timeout: u64,

    /// Seconds a single RPC request may take
    #[arg(long, default_value_t = 30)]
    rpc_timeout: u64,

    /// Quantile to compute for summaries, as QUANTILE:EPSILON (e.g. 0.99:0.001). Repeat to track
    /// several. Defaults to 0.05 through 1 with an epsilon of 0.01.
    #[arg(long = "quantile", value_name = "QUANTILE:EPSILON")]
    quantiles: Vec<String>,

    /// GeoIP2 country database (e.g. GeoLite2-Country.mmdb) to label peer connections with the
    /// country of their address
    #[arg(long, value_name = "PATH")]
    geoip_filepath: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> anyhow::Result<Config> {
        let config = Config {
            monerod_address: self.monerod_address.clone(),
            bind_address: self.bind_address.clone(),
            telemetry_path: self.telemetry_path.clone(),
            rpc_timeout: Duration::from_secs(self.rpc_timeout),
            scrape: ScrapeConfig {
                timeout: Duration::from_secs(self.scrape_timeout),
                ..Default::default()
            },
            geoip_filepath: self.geoip_filepath.clone(),
        }
        .with_quantiles(&self.quantiles)?;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    let config = args.config().context("invalid configuration")?;

    let client = HttpDaemonClient::new(config.daemon_url()?, config.rpc_timeout)
        .context("building monerod client")?;

    let countries = config.country_mapper()?;

    let registry = prometheus::Registry::new();
    let telemetry = ExporterMetrics::new(&registry).context("registering exporter metrics")?;
    #[cfg(target_os = "linux")]
    monero_exporter::telemetry::register_process_collector(&registry)
        .context("registering process metrics")?;

    let orchestrator = Orchestrator::new(Arc::new(client), default_producers(), config.scrape)
        .with_country_mapper(countries)
        .with_telemetry(telemetry);
    info!(
        monerod = %config.monerod_address,
        producers = ?orchestrator.producers(),
        geoip = ?config.geoip_filepath,
        "collecting metrics"
    );

    let exporter = ExporterBuilder::new(Arc::new(orchestrator))
        .with_address(config.bind_address)
        .with_path(config.telemetry_path)
        .with_registry(registry)
        .bind()
        .await
        .context("starting exporter")?;

    tokio::select! {
        res = exporter.serve() => res.context("serving metrics")?,
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for ctrl-c")?;
            info!("shutting down");
        }
    }

    Ok(())
}
