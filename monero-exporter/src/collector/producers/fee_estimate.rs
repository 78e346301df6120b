use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    collector::{CollectError, Producer, ProducerDeps},
    context::ScrapeContext,
    metric::{Metric, Sink},
    rpc::DaemonClient,
};

/// Blocks of leeway given to the daemon's fee estimation
const GRACE_BLOCKS: u64 = 1;

#[derive(Debug)]
pub struct FeeEstimateProducer {
    client: Arc<dyn DaemonClient>,
    sink: Sink,
}

impl FeeEstimateProducer {
    pub fn new(deps: &ProducerDeps) -> Self {
        Self { client: deps.client.clone(), sink: deps.sink.clone() }
    }
}

#[async_trait]
impl Producer for FeeEstimateProducer {
    fn name(&self) -> &'static str {
        "fee_estimate"
    }

    async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError> {
        let estimate = self
            .client
            .get_fee_estimate(ctx, GRACE_BLOCKS)
            .await
            .map_err(CollectError::rpc("get fee estimate"))?;

        self.sink.emit(Metric::gauge(
            "monero_fee_estimate",
            "estimated fee, in atomic units per byte",
            estimate.fee as f64,
        ));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collector::producers::testing::*,
        rpc::{GetFeeEstimateResult, MockDaemonClient},
    };

    #[tokio::test]
    async fn asks_with_one_grace_block() {
        let mut client = MockDaemonClient::new();
        client
            .expect_get_fee_estimate()
            .withf(|_, grace_blocks| *grace_blocks == 1)
            .times(1)
            .returning(|_, _| Ok(GetFeeEstimateResult { fee: 20_000, quantization_mask: 10_000 }));

        let (deps, mut rx) = deps(client);
        FeeEstimateProducer::new(&deps).collect(&ctx()).await.unwrap();

        assert_eq!(gauge(&rx.drain(), "monero_fee_estimate"), 20_000.);
    }
}
