use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    collector::{CollectError, Producer, ProducerDeps},
    context::ScrapeContext,
    metric::{Metric, Sink},
    rpc::DaemonClient,
};

/// Per-method usage of the daemon's RPC server, from `rpc_access_tracking`
///
/// Only available on unrestricted RPC endpoints.
#[derive(Debug)]
pub struct RpcProducer {
    client: Arc<dyn DaemonClient>,
    sink: Sink,
}

impl RpcProducer {
    pub fn new(deps: &ProducerDeps) -> Self {
        Self { client: deps.client.clone(), sink: deps.sink.clone() }
    }
}

#[async_trait]
impl Producer for RpcProducer {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError> {
        let res = self
            .client
            .rpc_access_tracking(ctx)
            .await
            .map_err(CollectError::rpc("rpc access tracking"))?;

        for entry in res.data {
            self.sink.emit(
                Metric::counter(
                    "monero_rpc_hits_total",
                    "number of hits that a particular rpc method had since startup",
                    entry.count as f64,
                )
                .with_label("method", entry.rpc.clone()),
            );
            self.sink.emit(
                Metric::counter(
                    "monero_rpc_seconds_total",
                    "amount of time spent serving the method since startup",
                    Duration::from_nanos(entry.time).as_secs_f64(),
                )
                .with_label("method", entry.rpc),
            );
        }

        Ok(())
    }
}
