use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::trace;
use url::Url;

use super::*;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// A [`DaemonClient`] talking to `monerod` over HTTP
#[derive(Debug, Clone)]
pub struct HttpDaemonClient {
    http: reqwest::Client,
    base: Url,
}

impl HttpDaemonClient {
    /// Create a client for the daemon at `address`, bounding every request by `timeout`
    pub fn new(mut address: Url, timeout: Duration) -> Result<Self, RpcError> {
        // Endpoints are joined onto the address, which drops the last segment unless it is a
        // directory.
        if !address.path().ends_with('/') {
            let path = format!("{}/", address.path());
            address.set_path(&path);
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base: address })
    }

    pub fn address(&self) -> &Url {
        &self.base
    }

    async fn post<R: DeserializeOwned>(
        &self,
        ctx: &ScrapeContext,
        path: &str,
        body: &impl Serialize,
    ) -> Result<R, RpcError> {
        let url = self.base.join(path)?;
        trace!(%url, "daemon request");

        ctx.run(async {
            let response = self.http.post(url).json(body).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(RpcError::Status(status));
            }

            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        })
        .await
    }

    async fn json_rpc<R: DeserializeOwned>(
        &self,
        ctx: &ScrapeContext,
        method: &str,
        params: Option<Value>,
    ) -> Result<R, RpcError> {
        let request = JsonRpcRequest { jsonrpc: "2.0", id: "0", method, params };
        let response: JsonRpcResponse<R> = self.post(ctx, "json_rpc", &request).await?;

        match response {
            JsonRpcResponse { error: Some(err), .. } => {
                Err(RpcError::Rpc { code: err.code, message: err.message })
            }
            JsonRpcResponse { result: Some(result), .. } => Ok(result),
            _ => Err(RpcError::MissingResult),
        }
    }
}

#[async_trait]
impl DaemonClient for HttpDaemonClient {
    async fn get_info(&self, ctx: &ScrapeContext) -> Result<GetInfoResult, RpcError> {
        self.json_rpc(ctx, "get_info", None).await
    }

    async fn get_connections(&self, ctx: &ScrapeContext) -> Result<GetConnectionsResult, RpcError> {
        self.json_rpc(ctx, "get_connections", None).await
    }

    async fn get_peer_list(&self, ctx: &ScrapeContext) -> Result<GetPeerListResult, RpcError> {
        self.post(ctx, "get_peer_list", &json!({})).await
    }

    async fn get_last_block_header(
        &self,
        ctx: &ScrapeContext,
    ) -> Result<GetLastBlockHeaderResult, RpcError> {
        self.json_rpc(ctx, "get_last_block_header", None).await
    }

    async fn get_block(
        &self,
        ctx: &ScrapeContext,
        params: GetBlockParams,
    ) -> Result<GetBlockResult, RpcError> {
        let params = match params {
            GetBlockParams::Height(height) => json!({ "height": height }),
            GetBlockParams::Hash(hash) => json!({ "hash": hash }),
        };
        self.json_rpc(ctx, "get_block", Some(params)).await
    }

    async fn get_transactions(
        &self,
        ctx: &ScrapeContext,
        hashes: Vec<String>,
    ) -> Result<GetTransactionsResult, RpcError> {
        let body = json!({ "txs_hashes": hashes, "decode_as_json": true });
        self.post(ctx, "get_transactions", &body).await
    }

    async fn get_transaction_pool(
        &self,
        ctx: &ScrapeContext,
    ) -> Result<GetTransactionPoolResult, RpcError> {
        self.post(ctx, "get_transaction_pool", &json!({})).await
    }

    async fn get_transaction_pool_stats(
        &self,
        ctx: &ScrapeContext,
    ) -> Result<GetTransactionPoolStatsResult, RpcError> {
        self.post(ctx, "get_transaction_pool_stats", &json!({})).await
    }

    async fn get_net_stats(&self, ctx: &ScrapeContext) -> Result<GetNetStatsResult, RpcError> {
        self.post(ctx, "get_net_stats", &json!({})).await
    }

    async fn get_fee_estimate(
        &self,
        ctx: &ScrapeContext,
        grace_blocks: u64,
    ) -> Result<GetFeeEstimateResult, RpcError> {
        self.json_rpc(ctx, "get_fee_estimate", Some(json!({ "grace_blocks": grace_blocks }))).await
    }

    async fn get_bans(&self, ctx: &ScrapeContext) -> Result<GetBansResult, RpcError> {
        self.json_rpc(ctx, "get_bans", None).await
    }

    async fn rpc_access_tracking(
        &self,
        ctx: &ScrapeContext,
    ) -> Result<RpcAccessTrackingResult, RpcError> {
        self.json_rpc(ctx, "rpc_access_tracking", None).await
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::POST, MockServer};

    use super::*;

    fn client(server: &MockServer) -> HttpDaemonClient {
        let address = Url::parse(&server.base_url()).unwrap();
        HttpDaemonClient::new(address, Duration::from_secs(5)).unwrap()
    }

    fn ctx() -> ScrapeContext {
        ScrapeContext::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn json_rpc_results_are_unwrapped() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/json_rpc");
                then.status(200).json_body(json!({
                    "id": "0",
                    "jsonrpc": "2.0",
                    "result": {
                        "height": 3_100_000,
                        "mainnet": true,
                        "status": "OK",
                        "white_peerlist_size": 1000
                    }
                }));
            })
            .await;

        let info = client(&server).get_info(&ctx()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(info.height, 3_100_000);
        assert_eq!(info.white_peerlist_size, 1000);
        assert!(info.mainnet);
    }

    #[tokio::test]
    async fn json_rpc_errors_are_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/json_rpc");
                then.status(200).json_body(json!({
                    "id": "0",
                    "jsonrpc": "2.0",
                    "error": { "code": -32601, "message": "Method not found" }
                }));
            })
            .await;

        let err = client(&server).get_bans(&ctx()).await.unwrap_err();
        assert!(matches!(err, RpcError::Rpc { code: -32601, .. }), "{err}");
    }

    #[tokio::test]
    async fn plain_endpoints_are_posted_to_their_own_path() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/get_net_stats");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "total_bytes_in": 4096,
                    "total_bytes_out": 1024
                }));
            })
            .await;

        let stats = client(&server).get_net_stats(&ctx()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(stats.total_bytes_in, 4096);
        assert_eq!(stats.total_bytes_out, 1024);
    }

    #[tokio::test]
    async fn http_failures_surface_the_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/get_transaction_pool");
                then.status(403);
            })
            .await;

        let err = client(&server).get_transaction_pool(&ctx()).await.unwrap_err();
        assert!(matches!(err, RpcError::Status(status) if status.as_u16() == 403), "{err}");
    }

    #[tokio::test]
    async fn garbage_bodies_fail_to_decode() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/get_peer_list");
                then.status(200).body("<html>nope</html>");
            })
            .await;

        let err = client(&server).get_peer_list(&ctx()).await.unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)), "{err}");
    }

    #[test]
    fn endpoints_keep_the_address_path() {
        let address = Url::parse("http://node.local:18081/monero").unwrap();
        let client = HttpDaemonClient::new(address, Duration::from_secs(1)).unwrap();

        assert_eq!(client.address().join("json_rpc").unwrap().path(), "/monero/json_rpc");
    }
}
