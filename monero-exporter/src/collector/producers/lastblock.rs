use std::sync::Arc;

use async_trait::async_trait;

use super::fee_per_kb;
use crate::{
    collector::{
        ATOMIC_UNITS_PER_XMR, CollectError, GaugeField, Producer, ProducerDeps, emit_gauges,
        summarize,
    },
    context::ScrapeContext,
    metric::{Metric, Sink},
    rpc::{BlockHeader, DaemonClient, GetBlockParams, GetTransactionsResult, TransactionJson},
    summary::SummaryOpts,
};

/// Bulletproof size per output, in bytes, before aggregation
const BULLETPROOF_BASE: u64 = 368;

/// Weight of a transaction of `size` bytes with `outputs` outputs
///
/// Transactions with up to two outputs weigh their size. Larger ones also pay back part of the
/// space saved by aggregating their range proofs: outputs are padded to a power of two and a
/// bulletproof over them takes `32 * (9 + 2 * nlr)` bytes, with `nlr = log2(padded) + 6`.
pub fn transaction_weight(size: u64, outputs: u64) -> u64 {
    if outputs <= 2 {
        return size;
    }

    let padded = outputs.next_power_of_two();
    let nlr = u64::from(padded.trailing_zeros()) + 6;
    let bp_size = 32 * (9 + 2 * nlr);
    let clawback = (BULLETPROOF_BASE * padded - bp_size) * 4 / 5;

    size + clawback
}

/// The last block's transactions, decoded, along with their serialized sizes
#[derive(Debug, Default)]
struct BlockTransactions {
    txns: Vec<TransactionJson>,
    sizes: Vec<u64>,
}

impl BlockTransactions {
    fn decode(res: &GetTransactionsResult) -> Result<Self, serde_json::Error> {
        let txns = res.txs.iter().map(|t| t.transaction()).collect::<Result<Vec<_>, _>>()?;
        let sizes = res.txs.iter().map(|t| t.size() as u64).collect();
        Ok(Self { txns, sizes })
    }

    fn fees(&self) -> u64 {
        self.txns.iter().map(|t| t.rct_signatures.txn_fee).sum()
    }

    fn with_sizes(&self) -> impl Iterator<Item = (&TransactionJson, u64)> {
        self.txns.iter().zip(self.sizes.iter().copied())
    }
}

struct LastBlock {
    header: BlockHeader,
    txns: BlockTransactions,
}

const HEADER_GAUGES: &[GaugeField<LastBlock>] = &[
    GaugeField::new("monero_lastblock_size_bytes", "total size of the last block", |b| {
        b.header.block_size as f64
    }),
    GaugeField::new("monero_lastblock_weight_bytes", "total weight of the last block", |b| {
        b.header.block_weight as f64
    }),
    GaugeField::new("monero_lastblock_difficulty", "difficulty used for the last block", |b| {
        b.header.difficulty as f64
    }),
    GaugeField::new(
        "monero_lastblock_fees_monero",
        "total amount of fees included in this block",
        |b| b.txns.fees() as f64 / ATOMIC_UNITS_PER_XMR,
    ),
    GaugeField::new("monero_lastblock_height", "height of the last block", |b| {
        b.header.height as f64
    }),
    GaugeField::new(
        "monero_lastblock_reward_monero",
        "total amount of rewards granted in the last block (subsidy + fees)",
        |b| b.header.reward as f64 / ATOMIC_UNITS_PER_XMR,
    ),
    GaugeField::new("monero_lastblock_subsidy_monero", "newly minted monero for this block", |b| {
        (b.header.reward as f64 - b.txns.fees() as f64) / ATOMIC_UNITS_PER_XMR
    }),
    GaugeField::new(
        "monero_lastblock_transactions",
        "number of transactions seen in the last block",
        |b| b.header.num_txes as f64,
    ),
    GaugeField::new("monero_lastblock_version_major", "major version of the block format", |b| {
        b.header.major_version as f64
    }),
    GaugeField::new("monero_lastblock_version_minor", "minor version of the block format", |b| {
        b.header.minor_version as f64
    }),
];

/// Statistics about the most recent block and the transactions it includes
#[derive(Debug)]
pub struct LastBlockProducer {
    client: Arc<dyn DaemonClient>,
    sink: Sink,
    summary: SummaryOpts,
}

impl LastBlockProducer {
    pub fn new(deps: &ProducerDeps) -> Self {
        Self { client: deps.client.clone(), sink: deps.sink.clone(), summary: deps.summary.clone() }
    }

    async fn fetch(&self, ctx: &ScrapeContext) -> Result<LastBlock, CollectError> {
        let last = self
            .client
            .get_last_block_header(ctx)
            .await
            .map_err(CollectError::rpc("get last block header"))?;

        let block = self
            .client
            .get_block(ctx, GetBlockParams::Hash(last.block_header.hash))
            .await
            .map_err(CollectError::rpc("get block"))?;
        let inner = block.inner_json().map_err(CollectError::decode("block inner json"))?;

        // a block with only its miner transaction has nothing to look up
        let txns = if inner.tx_hashes.is_empty() {
            BlockTransactions::default()
        } else {
            let res = self
                .client
                .get_transactions(ctx, inner.tx_hashes)
                .await
                .map_err(CollectError::rpc("get transactions"))?;
            BlockTransactions::decode(&res).map_err(CollectError::decode("transaction json"))?
        };

        Ok(LastBlock { header: block.block_header, txns })
    }

    fn emit_distributions(&self, txns: &BlockTransactions) {
        let fees = txns.with_sizes().filter_map(|(t, size)| fee_per_kb(t.rct_signatures.txn_fee, size));
        self.sink.emit(Metric::summary(
            "monero_lastblock_fees_micronero_per_kb",
            "distribution of the feeperkb utilized for txns",
            summarize(&self.summary, fees),
        ));

        self.sink.emit(Metric::summary(
            "monero_lastblock_transactions_size_bytes",
            "distribution of the size of the transactions included",
            summarize(&self.summary, txns.sizes.iter().map(|&size| size as f64)),
        ));

        let weights =
            txns.with_sizes().map(|(t, size)| transaction_weight(size, t.vout.len() as u64) as f64);
        self.sink.emit(Metric::summary(
            "monero_lastblock_transactions_weight_bytes",
            "distribution of the weight of the transactions included",
            summarize(&self.summary, weights),
        ));

        self.sink.emit(Metric::summary(
            "monero_lastblock_transactions_inputs",
            "distribution of inputs in the last block",
            summarize(&self.summary, txns.txns.iter().map(|t| t.vin.len() as f64)),
        ));
        self.sink.emit(Metric::summary(
            "monero_lastblock_transactions_outputs",
            "distribution of outputs in the last block",
            summarize(&self.summary, txns.txns.iter().map(|t| t.vout.len() as f64)),
        ));
    }
}

#[async_trait]
impl Producer for LastBlockProducer {
    fn name(&self) -> &'static str {
        "lastblock"
    }

    async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError> {
        let block = self.fetch(ctx).await?;

        emit_gauges(&self.sink, HEADER_GAUGES, &block);
        self.emit_distributions(&block.txns);

        Ok(())
    }
}
