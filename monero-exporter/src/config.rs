//! Runtime configuration of the exporter.

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use url::Url;

use crate::{
    country::{CountryMapper, GeoIpCountry, UnknownCountry},
    summary::{SummaryOpts, Target, TargetParseError},
};

pub const DEFAULT_MONEROD_ADDRESS: &str = "http://localhost:18081";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:9000";
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid monerod address {0:?}: {1}")]
    InvalidDaemonAddress(String, url::ParseError),
    #[error("unsupported monerod address scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("invalid bind address {0:?}: {1}")]
    InvalidBindAddress(String, std::net::AddrParseError),
    #[error("invalid telemetry path {0:?}")]
    InvalidPath(String),
    #[error("invalid quantile target: {0}")]
    InvalidTarget(#[from] TargetParseError),
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("geoip database {0:?}: {1}")]
    GeoIp(PathBuf, maxminddb::MaxMindDBError),
}

/// Settings of a single scrape cycle
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Deadline of a whole cycle, defaults to 60 seconds
    pub timeout: Duration,
    /// Targets of every summary computed during the cycle
    pub summary: SummaryOpts,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_SCRAPE_TIMEOUT, summary: SummaryOpts::default() }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub monerod_address: String,
    pub bind_address: String,
    pub telemetry_path: String,
    pub rpc_timeout: Duration,
    pub scrape: ScrapeConfig,
    /// GeoIP2 country database used to label peer connections, peers are `unknown` without it
    pub geoip_filepath: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monerod_address: DEFAULT_MONEROD_ADDRESS.to_owned(),
            bind_address: DEFAULT_BIND_ADDRESS.to_owned(),
            telemetry_path: DEFAULT_TELEMETRY_PATH.to_owned(),
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            scrape: ScrapeConfig::default(),
            geoip_filepath: None,
        }
    }
}

impl Config {
    /// Replace the summary targets with `targets`, given as `quantile:epsilon` pairs
    ///
    /// An empty list keeps the defaults.
    pub fn with_quantiles<S: AsRef<str>>(mut self, targets: &[S]) -> Result<Self, ConfigError> {
        if targets.is_empty() {
            return Ok(self);
        }

        let targets = targets
            .iter()
            .map(|t| t.as_ref().parse::<Target>())
            .collect::<Result<Vec<_>, _>>()?;
        self.scrape.summary = SummaryOpts { targets };
        Ok(self)
    }

    pub fn daemon_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.monerod_address)
            .map_err(|e| ConfigError::InvalidDaemonAddress(self.monerod_address.clone(), e))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_owned())),
        }
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|e| ConfigError::InvalidBindAddress(self.bind_address.clone(), e))
    }

    /// Load the country mapper for peer connections
    pub fn country_mapper(&self) -> Result<Arc<dyn CountryMapper>, ConfigError> {
        match &self.geoip_filepath {
            Some(path) => GeoIpCountry::open(path)
                .map(|mapper| Arc::new(mapper) as Arc<dyn CountryMapper>)
                .map_err(|e| ConfigError::GeoIp(path.clone(), e)),
            None => Ok(Arc::new(UnknownCountry)),
        }
    }

    /// Check every setting, reporting the first invalid one
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.daemon_url()?;
        self.bind_socket()?;

        if !self.telemetry_path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.telemetry_path.clone()));
        }
        if self.scrape.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("scrape timeout"));
        }
        if self.rpc_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("rpc timeout"));
        }

        self.scrape.summary.targets.iter().try_for_each(Target::validate)?;
        Ok(())
    }
}
