use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    collector::{CollectError, Producer, ProducerDeps, summarize},
    context::ScrapeContext,
    country::{CountryMapper, country_of},
    metric::{Metric, Sink},
    rpc::{Connection, DaemonClient},
    summary::SummaryOpts,
};

/// Peers connected to or from the node, from `get_connections`
#[derive(Debug)]
pub struct ConnectionsProducer {
    client: Arc<dyn DaemonClient>,
    countries: Arc<dyn CountryMapper>,
    sink: Sink,
    summary: SummaryOpts,
}

impl ConnectionsProducer {
    pub fn new(deps: &ProducerDeps) -> Self {
        Self {
            client: deps.client.clone(),
            countries: deps.countries.clone(),
            sink: deps.sink.clone(),
            summary: deps.summary.clone(),
        }
    }

    fn emit_counts(&self, connections: &[Connection]) {
        let mut counts: BTreeMap<(&str, &str), u64> = BTreeMap::new();
        for conn in connections {
            let direction = if conn.incoming { "in" } else { "out" };
            *counts.entry((direction, conn.state.as_str())).or_default() += 1;
        }

        for ((direction, state), count) in counts {
            self.sink.emit(
                Metric::gauge(
                    "monero_p2p_connections",
                    "number of connections to/from this node",
                    count as f64,
                )
                .with_label("type", direction)
                .with_label("state", state),
            );
        }
    }

    fn emit_distributions(&self, connections: &[Connection]) {
        self.sink.emit(Metric::summary(
            "monero_p2p_connections_height",
            "distribution the height of the peers connected to/from us",
            summarize(&self.summary, connections.iter().map(|c| c.height as f64)),
        ));

        // rates are undefined for connections established within the last second
        let live = || connections.iter().filter(|c| c.live_time > 0);
        self.sink.emit(Metric::summary(
            "monero_p2p_connections_rx_rate_bps",
            "distribution of data receive rate in bytes/s",
            summarize(&self.summary, live().map(|c| c.recv_count as f64 / c.live_time as f64)),
        ));
        self.sink.emit(Metric::summary(
            "monero_p2p_connections_tx_rate_bps",
            "distribution of data transmit rate in bytes/s",
            summarize(&self.summary, live().map(|c| c.send_count as f64 / c.live_time as f64)),
        ));

        self.sink.emit(Metric::summary(
            "monero_p2p_connections_age",
            "distribution of age of the connections we have",
            summarize(&self.summary, connections.iter().map(|c| c.live_time as f64)),
        ));
    }

    fn emit_countries(&self, connections: &[Connection]) -> Result<(), CollectError> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for conn in connections {
            let country = country_of(self.countries.as_ref(), &conn.host)
                .map_err(|source| CollectError::Country { host: conn.host.clone(), source })?;
            *counts.entry(country).or_default() += 1;
        }

        for (country, count) in counts {
            self.sink.emit(
                Metric::gauge(
                    "monero_p2p_connections_country",
                    "number of connections per peer country",
                    count as f64,
                )
                .with_label("country", country),
            );
        }

        Ok(())
    }
}

#[async_trait]
impl Producer for ConnectionsProducer {
    fn name(&self) -> &'static str {
        "connections"
    }

    async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError> {
        let res =
            self.client.get_connections(ctx).await.map_err(CollectError::rpc("get connections"))?;

        self.emit_counts(&res.connections);
        self.emit_distributions(&res.connections);
        self.emit_countries(&res.connections)
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use super::*;
    use crate::{
        collector::producers::testing::*,
        country::CountryError,
        rpc::{GetConnectionsResult, MockDaemonClient},
    };

    fn conn(host: &str, incoming: bool, state: &str, live_time: u64, recv: u64) -> Connection {
        Connection {
            host: host.into(),
            incoming,
            state: state.into(),
            live_time,
            recv_count: recv,
            send_count: recv / 2,
            height: 3_000_000 + live_time,
            ..Default::default()
        }
    }

    fn client_with(connections: Vec<Connection>) -> MockDaemonClient {
        let mut client = MockDaemonClient::new();
        client
            .expect_get_connections()
            .times(1)
            .returning(move |_| Ok(GetConnectionsResult { connections: connections.clone() }));
        client
    }

    #[derive(Debug)]
    struct ByOctet;

    impl CountryMapper for ByOctet {
        fn country(&self, ip: IpAddr) -> Result<String, CountryError> {
            match ip {
                IpAddr::V4(v4) if v4.octets()[0] == 1 => Ok("AU".into()),
                IpAddr::V4(_) => Ok("DE".into()),
                IpAddr::V6(_) => Err(CountryError { ip, reason: "no v6 data".into() }),
            }
        }
    }

    #[tokio::test]
    async fn groups_connections_by_direction_and_state() {
        let client = client_with(vec![
            conn("1.1.1.1", true, "normal", 10, 1000),
            conn("2.2.2.2", true, "normal", 20, 1000),
            conn("3.3.3.3", false, "normal", 30, 1000),
            conn("4.4.4.4", false, "synchronizing", 40, 1000),
        ]);

        let (deps, mut rx) = deps(client);
        ConnectionsProducer::new(&deps).collect(&ctx()).await.unwrap();
        let metrics = rx.drain();

        let count = |direction: &str, state: &str| {
            metrics
                .iter()
                .find(|m| {
                    m.name == "monero_p2p_connections"
                        && m.label("type") == Some(direction)
                        && m.label("state") == Some(state)
                })
                .map(|m| m.value.clone())
        };
        use crate::metric::MetricValue::Gauge;
        assert_eq!(count("in", "normal"), Some(Gauge(2.)));
        assert_eq!(count("out", "normal"), Some(Gauge(1.)));
        assert_eq!(count("out", "synchronizing"), Some(Gauge(1.)));
        assert_eq!(count("in", "synchronizing"), None);

        let age = summary(&metrics, "monero_p2p_connections_age");
        assert_eq!(age.count, 4);
        assert_eq!(age.sum, 100.);
    }

    #[tokio::test]
    async fn rates_skip_fresh_connections() {
        let client = client_with(vec![
            conn("1.1.1.1", true, "normal", 10, 1000),
            conn("2.2.2.2", true, "normal", 0, 1000),
        ]);

        let (deps, mut rx) = deps(client);
        ConnectionsProducer::new(&deps).collect(&ctx()).await.unwrap();
        let metrics = rx.drain();

        let rx_rate = summary(&metrics, "monero_p2p_connections_rx_rate_bps");
        assert_eq!(rx_rate.count, 1);
        assert_eq!(rx_rate.sum, 100.);
        assert_eq!(summary(&metrics, "monero_p2p_connections_tx_rate_bps").sum, 50.);
        assert_eq!(summary(&metrics, "monero_p2p_connections_height").count, 2);
    }

    #[tokio::test]
    async fn counts_connections_per_country() {
        let client = client_with(vec![
            conn("1.1.1.1", true, "normal", 10, 0),
            conn("1.0.0.1", true, "normal", 10, 0),
            conn("8.8.8.8", false, "normal", 10, 0),
            conn("seed.example.org", false, "normal", 10, 0),
        ]);

        let (deps, mut rx) = deps_with_countries(client, Arc::new(ByOctet));
        ConnectionsProducer::new(&deps).collect(&ctx()).await.unwrap();
        let metrics = rx.drain();

        let by_country: BTreeMap<_, _> = metrics
            .iter()
            .filter(|m| m.name == "monero_p2p_connections_country")
            .map(|m| (m.label("country").unwrap_or_default().to_owned(), m.value.clone()))
            .collect();

        use crate::metric::MetricValue::Gauge;
        assert_eq!(by_country.len(), 3);
        assert_eq!(by_country["AU"], Gauge(2.));
        assert_eq!(by_country["DE"], Gauge(1.));
        assert_eq!(by_country["unknown"], Gauge(1.));
    }

    #[tokio::test]
    async fn lookup_failures_keep_earlier_metrics() {
        let client = client_with(vec![conn("2001:db8::1", true, "normal", 10, 0)]);

        let (deps, mut rx) = deps_with_countries(client, Arc::new(ByOctet));
        let err = ConnectionsProducer::new(&deps).collect(&ctx()).await.unwrap_err();
        let metrics = rx.drain();

        assert!(matches!(err, CollectError::Country { ref host, .. } if host == "2001:db8::1"));
        assert!(metrics.iter().any(|m| m.name == "monero_p2p_connections"));
        assert!(metrics.iter().all(|m| m.name != "monero_p2p_connections_country"));
    }
}
