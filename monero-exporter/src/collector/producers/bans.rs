use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    collector::{CollectError, Producer, ProducerDeps},
    context::ScrapeContext,
    metric::{Metric, Sink},
    rpc::DaemonClient,
};

#[derive(Debug)]
pub struct BansProducer {
    client: Arc<dyn DaemonClient>,
    sink: Sink,
}

impl BansProducer {
    pub fn new(deps: &ProducerDeps) -> Self {
        Self { client: deps.client.clone(), sink: deps.sink.clone() }
    }
}

#[async_trait]
impl Producer for BansProducer {
    fn name(&self) -> &'static str {
        "bans"
    }

    async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError> {
        let res = self.client.get_bans(ctx).await.map_err(CollectError::rpc("get bans"))?;

        self.sink.emit(Metric::gauge(
            "monero_bans",
            "number of nodes banned",
            res.bans.len() as f64,
        ));

        Ok(())
    }
}
