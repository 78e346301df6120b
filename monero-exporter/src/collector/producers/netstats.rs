use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    collector::{CollectError, Producer, ProducerDeps},
    context::ScrapeContext,
    metric::{Metric, Sink},
    rpc::DaemonClient,
};

/// Bytes moved over the p2p network since the daemon started
#[derive(Debug)]
pub struct NetStatsProducer {
    client: Arc<dyn DaemonClient>,
    sink: Sink,
}

impl NetStatsProducer {
    pub fn new(deps: &ProducerDeps) -> Self {
        Self { client: deps.client.clone(), sink: deps.sink.clone() }
    }
}

#[async_trait]
impl Producer for NetStatsProducer {
    fn name(&self) -> &'static str {
        "net"
    }

    async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError> {
        let stats = self.client.get_net_stats(ctx).await.map_err(CollectError::rpc("get netstats"))?;

        self.sink.emit(Metric::counter(
            "monero_net_rx_bytes_total",
            "number of bytes received by this node",
            stats.total_bytes_in as f64,
        ));
        self.sink.emit(Metric::counter(
            "monero_net_tx_bytes_total",
            "number of bytes sent by this node",
            stats.total_bytes_out as f64,
        ));

        Ok(())
    }
}
