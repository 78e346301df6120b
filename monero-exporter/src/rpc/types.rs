//! Results of the daemon RPC calls the exporter relies on.
//!
//! Only the fields used to derive metrics (plus a few identifying ones) are modelled. Every
//! struct tolerates missing fields, since restricted RPC endpoints leave some of them out.

use serde::{Deserialize, de::IgnoredAny};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetInfoResult {
    pub alt_blocks_count: u64,
    pub block_size_limit: u64,
    pub block_size_median: u64,
    pub block_weight_limit: u64,
    pub block_weight_median: u64,
    pub busy_syncing: bool,
    pub database_size: u64,
    pub difficulty: u64,
    pub free_space: u64,
    pub grey_peerlist_size: u64,
    pub height: u64,
    pub incoming_connections_count: u64,
    pub mainnet: bool,
    pub nettype: String,
    pub offline: bool,
    pub outgoing_connections_count: u64,
    pub rpc_connections_count: u64,
    pub start_time: i64,
    pub synchronized: bool,
    pub target_height: u64,
    pub tx_count: u64,
    pub tx_pool_size: u64,
    pub update_available: bool,
    pub version: String,
    pub white_peerlist_size: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub address: String,
    pub host: String,
    pub incoming: bool,
    pub height: u64,
    /// Seconds since the connection was established
    pub live_time: u64,
    pub recv_count: u64,
    pub send_count: u64,
    pub state: String,
    pub peer_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetConnectionsResult {
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Peer {
    pub id: u64,
    pub host: String,
    pub port: u16,
    /// Unix timestamp of when the peer was last seen
    pub last_seen: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetPeerListResult {
    pub white_list: Vec<Peer>,
    pub gray_list: Vec<Peer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockHeader {
    pub block_size: u64,
    pub block_weight: u64,
    pub difficulty: u64,
    pub hash: String,
    pub height: u64,
    pub major_version: u64,
    pub minor_version: u64,
    pub num_txes: u64,
    /// Atomic units
    pub reward: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetLastBlockHeaderResult {
    pub block_header: BlockHeader,
}

/// Selects a block either by height or by hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetBlockParams {
    Height(u64),
    Hash(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetBlockResult {
    pub block_header: BlockHeader,
    /// The block itself, as an embedded JSON document
    pub json: String,
    pub miner_tx_hash: String,
}

impl GetBlockResult {
    /// Decode the embedded [`BlockJson`]
    pub fn inner_json(&self) -> Result<BlockJson, serde_json::Error> {
        serde_json::from_str(&self.json)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockJson {
    pub major_version: u64,
    pub minor_version: u64,
    pub timestamp: i64,
    pub prev_id: String,
    pub nonce: u64,
    pub tx_hashes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RctSignatures {
    #[serde(rename = "type")]
    pub kind: u8,
    /// Atomic units
    #[serde(rename = "txnFee")]
    pub txn_fee: u64,
}

/// A decoded transaction, as returned in the `as_json`/`tx_json` fields
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionJson {
    pub version: u64,
    pub unlock_time: u64,
    pub vin: Vec<IgnoredAny>,
    pub vout: Vec<IgnoredAny>,
    pub rct_signatures: RctSignatures,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionEntry {
    pub tx_hash: String,
    pub as_hex: String,
    pub as_json: String,
    pub in_pool: bool,
    pub block_height: u64,
}

impl TransactionEntry {
    /// Size of the serialized transaction in bytes
    pub fn size(&self) -> usize {
        self.as_hex.len() / 2
    }

    pub fn transaction(&self) -> Result<TransactionJson, serde_json::Error> {
        serde_json::from_str(&self.as_json)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetTransactionsResult {
    pub txs: Vec<TransactionEntry>,
    pub missed_tx: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PoolTransaction {
    pub id_hash: String,
    pub blob_size: u64,
    pub weight: u64,
    /// Atomic units
    pub fee: u64,
    /// Unix timestamp of when the transaction entered the pool
    pub receive_time: i64,
    pub relayed: bool,
    pub double_spend_seen: bool,
    pub tx_json: String,
}

impl PoolTransaction {
    pub fn transaction(&self) -> Result<TransactionJson, serde_json::Error> {
        serde_json::from_str(&self.tx_json)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpentKeyImage {
    pub id_hash: String,
    pub txs_hashes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetTransactionPoolResult {
    pub transactions: Vec<PoolTransaction>,
    pub spent_key_images: Vec<SpentKeyImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PoolStats {
    pub bytes_max: u64,
    pub bytes_med: u64,
    pub bytes_min: u64,
    pub bytes_total: u64,
    /// Atomic units
    pub fee_total: u64,
    pub num_10m: u64,
    pub num_double_spends: u64,
    pub num_failing: u64,
    pub num_not_relayed: u64,
    pub oldest: i64,
    pub txs_total: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetTransactionPoolStatsResult {
    pub pool_stats: PoolStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetNetStatsResult {
    pub start_time: i64,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
    pub total_packets_in: u64,
    pub total_packets_out: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetFeeEstimateResult {
    /// Atomic units per byte
    pub fee: u64,
    pub quantization_mask: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Ban {
    pub host: String,
    pub ip: u32,
    pub seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetBansResult {
    pub bans: Vec<Ban>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RpcAccessEntry {
    pub rpc: String,
    pub count: u64,
    /// Nanoseconds spent serving the method
    pub time: u64,
    pub credits: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RpcAccessTrackingResult {
    pub data: Vec<RpcAccessEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_embedded_transaction_json() {
        let entry = TransactionEntry {
            as_hex: "ab".repeat(750),
            as_json: r#"{
                "version": 2,
                "unlock_time": 0,
                "vin": [{"key": {"amount": 0}}, {"key": {"amount": 0}}],
                "vout": [{"amount": 0}, {"amount": 0}, {"amount": 0}],
                "extra": [1, 2, 3],
                "rct_signatures": {"type": 6, "txnFee": 30720000}
            }"#
            .to_owned(),
            ..Default::default()
        };

        let txn = entry.transaction().unwrap();
        assert_eq!(entry.size(), 750);
        assert_eq!(txn.vin.len(), 2);
        assert_eq!(txn.vout.len(), 3);
        assert_eq!(txn.rct_signatures.txn_fee, 30_720_000);
        assert_eq!(txn.rct_signatures.kind, 6);
    }

    #[test]
    fn decodes_block_json() {
        let block = GetBlockResult {
            json: r#"{"major_version": 16, "tx_hashes": ["aa", "bb"]}"#.to_owned(),
            ..Default::default()
        };

        let inner = block.inner_json().unwrap();
        assert_eq!(inner.major_version, 16);
        assert_eq!(inner.tx_hashes, ["aa", "bb"]);
        assert!(GetBlockResult::default().inner_json().is_err());
    }

    #[test]
    fn missing_fields_default() {
        let info: GetInfoResult = serde_json::from_str(r#"{"height": 10, "mainnet": true}"#).unwrap();
        assert_eq!(info.height, 10);
        assert!(info.mainnet);
        assert_eq!(info.database_size, 0);
    }
}
