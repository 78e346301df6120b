use std::{sync::Arc, time::Duration};

use futures::{FutureExt, StreamExt, stream::FuturesUnordered};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::{CollectError, ProducerDeps, ProducerFactory};
use crate::{
    config::ScrapeConfig,
    context::ScrapeContext,
    country::{CountryMapper, UnknownCountry},
    metric::{Metric, Sink},
    rpc::DaemonClient,
    telemetry::ExporterMetrics,
};

/// How a scrape cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeOutcome {
    /// Every producer returned
    Completed,
    /// The deadline fired first; `abandoned` producers were still running
    TimedOut { abandoned: usize },
}

/// A producer that returned an error during a scrape
#[derive(Debug)]
pub struct ProducerFailure {
    pub producer: &'static str,
    pub error: CollectError,
}

/// Result of one scrape cycle
#[derive(Debug)]
pub struct Scrape {
    /// Every metric that reached the sink before the cycle ended
    pub metrics: Vec<Metric>,
    pub failures: Vec<ProducerFailure>,
    pub outcome: ScrapeOutcome,
    pub elapsed: Duration,
}

/// Runs every producer concurrently, once per scrape, under a shared deadline
///
/// A failing producer never affects its siblings: its error is logged and counted, and whatever
/// the other producers emitted is still returned. Producers still running at the deadline are
/// cancelled and left behind.
#[derive(Debug)]
pub struct Orchestrator {
    client: Arc<dyn DaemonClient>,
    countries: Arc<dyn CountryMapper>,
    factories: Vec<ProducerFactory>,
    config: ScrapeConfig,
    telemetry: Option<ExporterMetrics>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn DaemonClient>,
        factories: Vec<ProducerFactory>,
        config: ScrapeConfig,
    ) -> Self {
        Self { client, countries: Arc::new(UnknownCountry), factories, config, telemetry: None }
    }

    pub fn with_country_mapper(mut self, countries: Arc<dyn CountryMapper>) -> Self {
        self.countries = countries;
        self
    }

    /// Record scrape and producer timings and failures in `telemetry`
    pub fn with_telemetry(mut self, telemetry: ExporterMetrics) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Names of the producers run on every scrape, in spawn order
    pub fn producers(&self) -> Vec<&'static str> {
        self.factories.iter().map(ProducerFactory::name).collect()
    }

    /// Run one scrape cycle
    pub async fn scrape(&self) -> Scrape {
        let started = Instant::now();
        let ctx = ScrapeContext::new(self.config.timeout);
        let (sink, mut receiver) = Sink::channel();

        let deps = ProducerDeps {
            client: self.client.clone(),
            sink,
            summary: self.config.summary.clone(),
            countries: self.countries.clone(),
        };

        let mut pending: FuturesUnordered<_> = self
            .factories
            .iter()
            .map(|factory| {
                let name = factory.name();
                let mut producer = factory.build(&deps);
                let ctx = ctx.clone();

                tokio::spawn(async move {
                    let start = Instant::now();
                    let res = producer.collect(&ctx).await;
                    (res, start.elapsed())
                })
                .map(move |joined| (name, joined))
            })
            .collect();
        drop(deps);

        let mut failures = Vec::new();
        let deadline = tokio::time::sleep_until(ctx.deadline());
        tokio::pin!(deadline);

        let outcome = loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((name, Ok((res, elapsed)))) => {
                        debug!(collector = name, ?elapsed, ok = res.is_ok(), "collector finished");
                        self.observe_collector(name, elapsed, res.is_err());
                        if let Err(error) = res {
                            failures.push(ProducerFailure { producer: name, error });
                        }
                    }
                    Some((name, Err(join_error))) => {
                        self.observe_collector(name, started.elapsed(), true);
                        failures.push(ProducerFailure { producer: name, error: join_error.into() });
                    }
                    None => break ScrapeOutcome::Completed,
                },
                _ = &mut deadline => {
                    ctx.cancel();
                    break ScrapeOutcome::TimedOut { abandoned: pending.len() };
                }
            }
        };
        // Dropping the join handles detaches the producers still running. They observe the
        // cancelled context at their next call, and anything they emit afterwards is discarded.
        drop(pending);

        for failure in &failures {
            error!(collector = failure.producer, error = %failure.error, "collector failed");
        }
        if let ScrapeOutcome::TimedOut { abandoned } = outcome {
            warn!(abandoned, timeout = ?self.config.timeout, "scrape deadline exceeded");
        }

        let metrics = receiver.drain();
        let elapsed = started.elapsed();
        if let Some(telemetry) = &self.telemetry {
            telemetry.observe_scrape(elapsed.as_secs_f64(), outcome != ScrapeOutcome::Completed);
        }
        debug!(metrics = metrics.len(), failures = failures.len(), ?elapsed, "scrape done");

        Scrape { metrics, failures, outcome, elapsed }
    }

    fn observe_collector(&self, name: &str, elapsed: Duration, failed: bool) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.observe_collector(name, elapsed.as_secs_f64(), failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use prometheus::{Registry, TextEncoder};

    use super::*;
    use crate::{
        collector::Producer,
        metric::MetricValue,
        rpc::{MockDaemonClient, RpcError},
        summary::{SummaryOpts, Target},
    };

    /// Emits `value` under `name` after `delay`, or fails when `value` is `None`
    struct Fixed {
        name: &'static str,
        value: Option<f64>,
        delay: Duration,
        sink: Sink,
    }

    #[async_trait]
    impl Producer for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn collect(&mut self, ctx: &ScrapeContext) -> Result<(), CollectError> {
            let delay = self.delay;
            ctx.run(async move {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await
            .map_err(CollectError::rpc("sleep"))?;

            match self.value {
                Some(v) => {
                    self.sink.emit(Metric::gauge(self.name, "test", v));
                    Ok(())
                }
                None => Err(CollectError::Rpc {
                    step: "fetch",
                    source: RpcError::Rpc { code: -1, message: "boom".into() },
                }),
            }
        }
    }

    fn fixed(name: &'static str, value: Option<f64>, delay: Duration) -> ProducerFactory {
        ProducerFactory::new(name, move |deps| Fixed { name, value, delay, sink: deps.sink.clone() })
    }

    /// Summarizes a fixed sample with the configured targets
    struct Sizes {
        sink: Sink,
        summary: SummaryOpts,
    }

    #[async_trait]
    impl Producer for Sizes {
        fn name(&self) -> &'static str {
            "sizes"
        }

        async fn collect(&mut self, _ctx: &ScrapeContext) -> Result<(), CollectError> {
            let snapshot =
                crate::collector::summarize(&self.summary, [10., 20., 30., 40., 50.]);
            self.sink.emit(Metric::summary("sizes", "test", snapshot));
            Ok(())
        }
    }

    fn orchestrator(factories: Vec<ProducerFactory>, timeout: Duration) -> Orchestrator {
        let config = ScrapeConfig { timeout, ..Default::default() };
        Orchestrator::new(Arc::new(MockDaemonClient::new()), factories, config)
    }

    #[tokio::test]
    async fn failures_do_not_hide_other_metrics() {
        let orchestrator = orchestrator(
            vec![fixed("a", Some(1.), Duration::ZERO), fixed("b", None, Duration::ZERO)],
            Duration::from_secs(5),
        );

        let scrape = orchestrator.scrape().await;

        assert_eq!(scrape.outcome, ScrapeOutcome::Completed);
        assert_eq!(scrape.metrics.len(), 1);
        assert_eq!(scrape.metrics[0].name, "a");
        assert_eq!(scrape.metrics[0].value, MetricValue::Gauge(1.));

        assert_eq!(scrape.failures.len(), 1);
        assert_eq!(scrape.failures[0].producer, "b");
        assert_eq!(scrape.failures[0].error.to_string(), "fetch: rpc error -1: boom");
    }

    #[tokio::test]
    async fn producers_run_concurrently() {
        let factories = (0..8)
            .map(|i| {
                let name: &'static str = ["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"][i];
                fixed(name, Some(i as f64), Duration::from_millis(200))
            })
            .collect();
        let orchestrator = orchestrator(factories, Duration::from_secs(5));

        let scrape = orchestrator.scrape().await;

        assert_eq!(scrape.outcome, ScrapeOutcome::Completed);
        assert_eq!(scrape.metrics.len(), 8);
        assert!(scrape.elapsed < Duration::from_millis(1000), "{:?}", scrape.elapsed);
    }

    #[tokio::test]
    async fn deadline_bounds_the_scrape() {
        let orchestrator = orchestrator(
            vec![
                fixed("fast", Some(1.), Duration::ZERO),
                fixed("slow", Some(2.), Duration::from_secs(30)),
            ],
            Duration::from_millis(200),
        );

        let scrape = orchestrator.scrape().await;

        assert_eq!(scrape.outcome, ScrapeOutcome::TimedOut { abandoned: 1 });
        assert!(scrape.elapsed < Duration::from_secs(2), "{:?}", scrape.elapsed);
        assert_eq!(scrape.metrics.len(), 1);
        assert_eq!(scrape.metrics[0].name, "fast");
    }

    #[tokio::test]
    async fn summaries_use_the_configured_targets() {
        let config = ScrapeConfig {
            timeout: Duration::from_secs(5),
            summary: SummaryOpts::default().targets(vec![Target::new(0.5, 0.01)]),
        };
        let factories = vec![ProducerFactory::new("sizes", |deps: &ProducerDeps| Sizes {
            sink: deps.sink.clone(),
            summary: deps.summary.clone(),
        })];
        let orchestrator = Orchestrator::new(Arc::new(MockDaemonClient::new()), factories, config);

        let scrape = orchestrator.scrape().await;

        let MetricValue::Summary(snapshot) = &scrape.metrics[0].value else {
            panic!("expected a summary, got {:?}", scrape.metrics[0].value);
        };
        assert_eq!(snapshot.count, 5);
        assert_eq!(snapshot.sum, 150.);
        assert_eq!(snapshot.quantiles, [(0.5, 30.)]);
    }

    #[tokio::test]
    async fn telemetry_counts_failures_per_collector() {
        let registry = Registry::new();
        let telemetry = ExporterMetrics::new(&registry).unwrap();
        let orchestrator = orchestrator(
            vec![fixed("ok", Some(1.), Duration::ZERO), fixed("broken", None, Duration::ZERO)],
            Duration::from_secs(5),
        )
        .with_telemetry(telemetry);

        orchestrator.scrape().await;
        orchestrator.scrape().await;

        let output = TextEncoder::new().encode_to_string(&registry.gather()).unwrap();
        assert!(output.contains("monero_exporter_scrapes_total 2"));
        assert!(output.contains("monero_exporter_collector_failures_total{collector=\"broken\"} 2"));
        assert!(!output.contains("monero_exporter_collector_failures_total{collector=\"ok\"}"));
    }

    #[tokio::test]
    async fn every_cycle_starts_fresh() {
        let orchestrator =
            orchestrator(vec![fixed("a", Some(1.), Duration::ZERO)], Duration::from_secs(5));

        assert_eq!(orchestrator.producers(), ["a"]);
        assert_eq!(orchestrator.scrape().await.metrics.len(), 1);
        assert_eq!(orchestrator.scrape().await.metrics.len(), 1);
    }
}
