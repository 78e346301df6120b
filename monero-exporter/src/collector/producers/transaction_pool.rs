use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::{fee_per_kb, seconds_since};
use crate::{
    collector::{
        ATOMIC_UNITS_PER_XMR, CollectError, GaugeField, Producer, ProducerDeps, emit_gauges,
        summarize,
    },
    context::ScrapeContext,
    metric::{Metric, Sink},
    rpc::{DaemonClient, GetTransactionPoolResult, PoolStats, TransactionJson},
    summary::SummaryOpts,
};

struct Pool {
    stats: PoolStats,
    pool: GetTransactionPoolResult,
}

const POOL_GAUGES: &[GaugeField<Pool>] = &[
    GaugeField::new(
        "monero_transaction_pool_spent_key_images",
        "total number of key images spent across all transactions in the pool",
        |p| p.pool.spent_key_images.len() as f64,
    ),
    GaugeField::new("monero_transaction_pool_size_bytes", "total size of the transaction pool", |p| {
        p.stats.bytes_total as f64
    }),
    GaugeField::new(
        "monero_transaction_pool_transactions",
        "number of transactions in the pool at the moment of the scrape",
        |p| p.pool.transactions.len() as f64,
    ),
    GaugeField::new(
        "monero_transaction_pool_fees_monero",
        "total amount of fee being spent in the transaction pool",
        |p| p.stats.fee_total as f64 / ATOMIC_UNITS_PER_XMR,
    ),
    GaugeField::new(
        "monero_transaction_pool_failing_transactions",
        "number of transactions that are marked as failing",
        |p| p.stats.num_failing as f64,
    ),
    GaugeField::new(
        "monero_transaction_pool_double_spends",
        "transactions doubly spending outputs",
        |p| p.stats.num_double_spends as f64,
    ),
    GaugeField::new(
        "monero_transaction_pool_not_relayed",
        "number of transactions that have not been relayed",
        |p| p.stats.num_not_relayed as f64,
    ),
    GaugeField::new(
        "monero_transaction_pool_older_than_10m",
        "number of transactions that are older than 10m",
        |p| p.stats.num_10m as f64,
    ),
];

/// Contents of the transaction pool
#[derive(Debug)]
pub struct TransactionPoolProducer {
    client: Arc<dyn DaemonClient>,
    sink: Sink,
    summary: SummaryOpts,
}

impl TransactionPoolProducer {
    pub fn new(deps: &ProducerDeps) -> Self {
        Self { client: deps.client.clone(), sink: deps.sink.clone(), summary: deps.summary.clone() }
    }

    fn emit_distributions(&self, pool: &GetTransactionPoolResult, txns: &[TransactionJson]) {
        self.sink.emit(Metric::summary(
            "monero_transaction_pool_transactions_size_bytes",
            "distribution of the size of the transactions in the transaction pool",
            summarize(&self.summary, pool.transactions.iter().map(|t| t.blob_size as f64)),
        ));

        let fees = pool.transactions.iter().filter_map(|t| fee_per_kb(t.fee, t.blob_size));
        self.sink.emit(Metric::summary(
            "monero_transaction_pool_fees_micronero_per_kb",
            "distribution of the feeperkb utilized for txns in the pool",
            summarize(&self.summary, fees),
        ));

        self.sink.emit(Metric::summary(
            "monero_transaction_pool_transactions_inputs",
            "distribution of inputs in the pool",
            summarize(&self.summary, txns.iter().map(|t| t.vin.len() as f64)),
        ));
        self.sink.emit(Metric::summary(
            "monero_transaction_pool_transactions_outputs",
            "distribution of outputs in the pool",
            summarize(&self.summary, txns.iter().map(|t| t.vout.len() as f64)),
        ));

        let now = Utc::now();
        self.sink.emit(Metric::summary(
            "monero_transaction_pool_transactions_age",
            "distribution of for how long transactions have been in the pool",
            summarize(
                &self.summary,
                pool.transactions.iter().map(|t| seconds_since(now, t.receive_time)),
            ),
        ));
    }
}

#[async_trait]
impl Producer for TransactionPoolProducer {
    fn name(&self) -> &'static str {
        "transaction_pool"
    }

    async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError> {
        let stats = self
            .client
            .get_transaction_pool_stats(ctx)
            .await
            .map_err(CollectError::rpc("get transaction pool stats"))?;
        let pool = self
            .client
            .get_transaction_pool(ctx)
            .await
            .map_err(CollectError::rpc("get transaction pool"))?;

        let txns = pool
            .transactions
            .iter()
            .map(|t| t.transaction())
            .collect::<Result<Vec<_>, _>>()
            .map_err(CollectError::decode("pool transaction json"))?;

        let pool = Pool { stats: stats.pool_stats, pool };
        emit_gauges(&self.sink, POOL_GAUGES, &pool);
        self.emit_distributions(&pool.pool, &txns);

        Ok(())
    }
}
