use std::{net::SocketAddr, sync::Arc, thread};

use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header::CONTENT_TYPE,
    server::conn::http1, service::service_fn,
};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::{collector::Orchestrator, families};

/// A builder for the HTTP exporter serving the daemon's metrics.
#[derive(Debug)]
pub struct ExporterBuilder {
    orchestrator: Arc<Orchestrator>,
    registry: Option<prometheus::Registry>,
    address: String,
    path: String,
}

impl ExporterBuilder {
    /// Create a new exporter running a scrape on `orchestrator` for every request.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            registry: None,
            address: crate::config::DEFAULT_BIND_ADDRESS.to_owned(),
            path: crate::config::DEFAULT_TELEMETRY_PATH.to_owned(),
        }
    }

    /// Set the socket address for the exporter.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the path metrics are served on.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the registry whose metrics are appended to every response, typically the one holding
    /// the exporter's own telemetry. Defaults to the global registry.
    pub fn with_registry(mut self, registry: prometheus::Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    fn path(&self) -> Result<String, ExporterError> {
        if self.path.is_empty() || !self.path.starts_with('/') {
            return Err(ExporterError::InvalidPath(self.path.clone()));
        }

        // Remove trailing slash from path
        let path = if self.path.eq("/") {
            "/".to_owned()
        } else {
            self.path.trim_end_matches('/').to_owned()
        };

        Ok(path)
    }

    fn address(&self) -> Result<SocketAddr, ExporterError> {
        self.address.parse().map_err(|e| ExporterError::InvalidAddress(self.address.clone(), e))
    }

    /// Validate the configuration and bind the listening socket.
    pub async fn bind(self) -> Result<Exporter, ExporterError> {
        let path = self.path()?;
        let address = self.address()?;
        let registry = self.registry.unwrap_or_else(|| prometheus::default_registry().clone());

        let listener = TcpListener::bind(address).await.map_err(ExporterError::Bind)?;
        let state = Arc::new(State { orchestrator: self.orchestrator, registry, path });

        Ok(Exporter { listener, state })
    }

    /// Install the HTTP exporter with the given configuration and start serving metrics.
    ///
    /// # Behavior
    /// - If a Tokio runtime is available, use it to spawn the listener.
    /// - Otherwise, spawn a new single-threaded Tokio runtime on a thread, and spawn the listener
    ///   there.
    ///
    /// Errors happening after the configuration was validated are logged.
    pub fn install(self) -> Result<(), ExporterError> {
        self.path()?;
        self.address()?;

        let fut = async move {
            let res = match self.bind().await {
                Ok(exporter) => exporter.serve().await,
                Err(err) => Err(err),
            };
            if let Err(err) = res {
                error!(%err, "exporter stopped");
            }
        };

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(fut);
        } else {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(ExporterError::Runtime)?;

            thread::spawn(move || runtime.block_on(fut));
        }

        Ok(())
    }
}

#[derive(Debug)]
struct State {
    orchestrator: Arc<Orchestrator>,
    registry: prometheus::Registry,
    path: String,
}

/// A bound exporter, ready to serve
#[derive(Debug)]
pub struct Exporter {
    listener: TcpListener,
    state: Arc<State>,
}

impl Exporter {
    pub fn local_addr(&self) -> Result<SocketAddr, ExporterError> {
        self.listener.local_addr().map_err(ExporterError::Bind)
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self) -> Result<(), ExporterError> {
        info!(address = ?self.listener.local_addr().ok(), path = %self.state.path, "serving metrics");

        loop {
            let (stream, peer) = self.listener.accept().await.map_err(ExporterError::Accept)?;
            let io = TokioIo::new(stream);
            let state = self.state.clone();

            let service = service_fn(move |req| serve_req(req, state.clone()));

            tokio::spawn(async move {
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(%peer, %err, "connection closed with error");
                }
            });
        }
    }
}

async fn serve_req(
    req: Request<Incoming>,
    state: Arc<State>,
) -> Result<Response<String>, Box<dyn std::error::Error + Send + Sync>> {
    if req.uri().path() != state.path {
        return Ok(Response::builder().status(StatusCode::NOT_FOUND).body("Not Found".to_owned())?);
    }
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return Ok(Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body("Method Not Allowed".to_owned())?);
    }

    let scrape = state.orchestrator.scrape().await;

    let mut metrics = families::gather(scrape.metrics);
    metrics.extend(state.registry.gather());

    let encoder = TextEncoder::new();
    let body = encoder.encode_to_string(&metrics)?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, encoder.format_type())
        .body(body)?;

    Ok(response)
}

/// An error that can occur when building or running the HTTP exporter.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    #[error("failed to bind to address: {0}")]
    Bind(std::io::Error),
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),
    #[error("failed to start runtime: {0}")]
    Runtime(std::io::Error),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid address: {0}: {1}")]
    InvalidAddress(String, std::net::AddrParseError),
}
