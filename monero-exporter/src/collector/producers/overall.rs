use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::seconds_since;
use crate::{
    collector::{CollectError, GaugeField, Producer, ProducerDeps, emit_gauges, flag},
    context::ScrapeContext,
    metric::{Metric, Sink},
    rpc::{DaemonClient, GetInfoResult},
};

const INFO_GAUGES: &[GaugeField<GetInfoResult>] = &[
    GaugeField::new(
        "monero_info_alternative_blocks",
        "number of blocks alternative to the longest",
        |i| i.alt_blocks_count as f64,
    ),
    GaugeField::new("monero_info_offline", "whether the node is offline", |i| flag(i.offline)),
    GaugeField::new("monero_info_mainnet", "whether the node is connected to mainnet", |i| {
        flag(i.mainnet)
    }),
    GaugeField::new(
        "monero_info_block_size_limit_bytes",
        "maximum hard limit of a block",
        |i| i.block_size_limit as f64,
    ),
    GaugeField::new(
        "monero_info_block_size_median_bytes",
        "current median size for computing dynamic fees",
        |i| i.block_size_median as f64,
    ),
    GaugeField::new(
        "monero_info_block_weight_limit_bytes",
        "maximum hard limit of a block weight",
        |i| i.block_weight_limit as f64,
    ),
    GaugeField::new(
        "monero_info_block_weight_median_bytes",
        "current median block weight",
        |i| i.block_weight_median as f64,
    ),
    GaugeField::new(
        "monero_info_synchronized",
        "whether the node's chain is in sync with the network",
        |i| flag(i.synchronized),
    ),
    GaugeField::new(
        "monero_info_busy_syncing",
        "whether the node is busy syncing blocks",
        |i| flag(i.busy_syncing),
    ),
    GaugeField::new("monero_info_height", "current height of the chain", |i| i.height as f64),
    GaugeField::new(
        "monero_info_target_height",
        "target height to achieve to be considered in sync",
        |i| i.target_height as f64,
    ),
    GaugeField::new(
        "monero_info_difficulty",
        "network difficulty for the next block",
        |i| i.difficulty as f64,
    ),
    GaugeField::new(
        "monero_info_rpc_connections",
        "number of rpc connections being served by the node",
        |i| i.rpc_connections_count as f64,
    ),
    GaugeField::new(
        "monero_info_incoming_connections",
        "number of p2p connections initiated by peers",
        |i| i.incoming_connections_count as f64,
    ),
    GaugeField::new(
        "monero_info_outgoing_connections",
        "number of p2p connections initiated by this node",
        |i| i.outgoing_connections_count as f64,
    ),
    GaugeField::new(
        "monero_info_white_peerlist",
        "number of entries in the white peerlist",
        |i| i.white_peerlist_size as f64,
    ),
    GaugeField::new(
        "monero_info_grey_peerlist",
        "number of entries in the grey peerlist",
        |i| i.grey_peerlist_size as f64,
    ),
    GaugeField::new(
        "monero_info_database_size_bytes",
        "size of the monero database",
        |i| i.database_size as f64,
    ),
    GaugeField::new(
        "monero_info_free_space_bytes",
        "amount of free space in the partition where monero's database is in",
        |i| i.free_space as f64,
    ),
    GaugeField::new(
        "monero_info_transactions_total",
        "total number of transactions seen so far",
        |i| i.tx_count as f64,
    ),
    GaugeField::new(
        "monero_info_transaction_pool_size",
        "number of transactions in the pool",
        |i| i.tx_pool_size as f64,
    ),
    GaugeField::new(
        "monero_info_update_available",
        "whether a newer version of the daemon is available",
        |i| flag(i.update_available),
    ),
];

/// General information about the node, from `get_info`
#[derive(Debug)]
pub struct OverallProducer {
    client: Arc<dyn DaemonClient>,
    sink: Sink,
}

impl OverallProducer {
    pub fn new(deps: &ProducerDeps) -> Self {
        Self { client: deps.client.clone(), sink: deps.sink.clone() }
    }
}

#[async_trait]
impl Producer for OverallProducer {
    fn name(&self) -> &'static str {
        "overall"
    }

    async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError> {
        let info = self.client.get_info(ctx).await.map_err(CollectError::rpc("get info"))?;

        // restricted RPC reports a zero start time
        if info.start_time != 0 {
            self.sink.emit(Metric::gauge(
                "monero_info_uptime_seconds_total",
                "for how long this node has been up",
                seconds_since(Utc::now(), info.start_time),
            ));
        }
        emit_gauges(&self.sink, INFO_GAUGES, &info);

        Ok(())
    }
}
