//! Access to a monero daemon's RPC interface.

use std::fmt;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::context::ScrapeContext;

mod http;
pub use http::HttpDaemonClient;

mod types;
pub use types::*;

/// Errors returned by a [`DaemonClient`]
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected http status {0}")]
    Status(reqwest::StatusCode),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("response carried neither a result nor an error")]
    MissingResult,
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
    #[error("cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// The daemon RPC calls producers fetch their data with
///
/// Every call runs under the given [`ScrapeContext`] and fails with [`RpcError::Cancelled`] or
/// [`RpcError::DeadlineExceeded`] once the scrape is over.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DaemonClient: Send + Sync + fmt::Debug {
    async fn get_info(&self, ctx: &ScrapeContext) -> Result<GetInfoResult, RpcError>;

    async fn get_connections(&self, ctx: &ScrapeContext) -> Result<GetConnectionsResult, RpcError>;

    async fn get_peer_list(&self, ctx: &ScrapeContext) -> Result<GetPeerListResult, RpcError>;

    async fn get_last_block_header(
        &self,
        ctx: &ScrapeContext,
    ) -> Result<GetLastBlockHeaderResult, RpcError>;

    async fn get_block(
        &self,
        ctx: &ScrapeContext,
        params: GetBlockParams,
    ) -> Result<GetBlockResult, RpcError>;

    /// Look up transactions by hash, decoded as JSON
    async fn get_transactions(
        &self,
        ctx: &ScrapeContext,
        hashes: Vec<String>,
    ) -> Result<GetTransactionsResult, RpcError>;

    async fn get_transaction_pool(
        &self,
        ctx: &ScrapeContext,
    ) -> Result<GetTransactionPoolResult, RpcError>;

    async fn get_transaction_pool_stats(
        &self,
        ctx: &ScrapeContext,
    ) -> Result<GetTransactionPoolStatsResult, RpcError>;

    async fn get_net_stats(&self, ctx: &ScrapeContext) -> Result<GetNetStatsResult, RpcError>;

    async fn get_fee_estimate(
        &self,
        ctx: &ScrapeContext,
        grace_blocks: u64,
    ) -> Result<GetFeeEstimateResult, RpcError>;

    async fn get_bans(&self, ctx: &ScrapeContext) -> Result<GetBansResult, RpcError>;

    async fn rpc_access_tracking(
        &self,
        ctx: &ScrapeContext,
    ) -> Result<RpcAccessTrackingResult, RpcError>;
}
