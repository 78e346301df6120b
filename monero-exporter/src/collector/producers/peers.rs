use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::seconds_since;
use crate::{
    collector::{CollectError, Producer, ProducerDeps, summarize},
    context::ScrapeContext,
    metric::{Metric, Sink},
    rpc::DaemonClient,
    summary::SummaryOpts,
};

/// Sizes of the white and gray peer lists, and how recently white peers were seen
#[derive(Debug)]
pub struct PeerListProducer {
    client: Arc<dyn DaemonClient>,
    sink: Sink,
    summary: SummaryOpts,
}

impl PeerListProducer {
    pub fn new(deps: &ProducerDeps) -> Self {
        Self { client: deps.client.clone(), sink: deps.sink.clone(), summary: deps.summary.clone() }
    }
}

#[async_trait]
impl Producer for PeerListProducer {
    fn name(&self) -> &'static str {
        "peerlist"
    }

    async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError> {
        let res = self.client.get_peer_list(ctx).await.map_err(CollectError::rpc("get peerlist"))?;

        for (kind, list) in [("white", &res.white_list), ("gray", &res.gray_list)] {
            self.sink.emit(
                Metric::gauge(
                    "monero_peerlist",
                    "number of node entries in the peerlist",
                    list.len() as f64,
                )
                .with_label("type", kind),
            );
        }

        let now = Utc::now();
        self.sink.emit(Metric::summary(
            "monero_peerlist_lastseen",
            "distribution of when our peers have been seen",
            summarize(&self.summary, res.white_list.iter().map(|p| seconds_since(now, p.last_seen))),
        ));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collector::producers::testing::*,
        metric::MetricValue,
        rpc::{GetPeerListResult, MockDaemonClient, Peer},
    };

    #[tokio::test]
    async fn counts_both_lists_and_ages_white_peers() {
        let now = Utc::now().timestamp();
        let mut client = MockDaemonClient::new();
        client.expect_get_peer_list().times(1).returning(move |_| {
            Ok(GetPeerListResult {
                white_list: vec![
                    Peer { last_seen: now - 60, ..Default::default() },
                    Peer { last_seen: now - 120, ..Default::default() },
                ],
                gray_list: vec![Peer::default(); 5],
            })
        });

        let (deps, mut rx) = deps(client);
        PeerListProducer::new(&deps).collect(&ctx()).await.unwrap();
        let metrics = rx.drain();

        let sizes: Vec<_> = metrics
            .iter()
            .filter(|m| m.name == "monero_peerlist")
            .map(|m| (m.label("type"), m.value.clone()))
            .collect();
        assert_eq!(
            sizes,
            [(Some("white"), MetricValue::Gauge(2.)), (Some("gray"), MetricValue::Gauge(5.))]
        );

        let lastseen = summary(&metrics, "monero_peerlist_lastseen");
        assert_eq!(lastseen.count, 2);
        assert!(lastseen.sum >= 180.);
    }

    #[tokio::test]
    async fn rpc_failure_emits_nothing() {
        let mut client = MockDaemonClient::new();
        client.expect_get_peer_list().returning(|_| Err(unavailable()));

        let (deps, mut rx) = deps(client);
        let err = PeerListProducer::new(&deps).collect(&ctx()).await.unwrap_err();

        assert!(matches!(err, CollectError::Rpc { step: "get peerlist", .. }));
        assert!(rx.drain().is_empty());
    }
}
