//! Metrics the exporter keeps about its own scrapes.

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    core::Collector,
};

/// Buckets for scrape and collector durations, in seconds
pub const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1., 2.5, 5., 10., 30., 60.];

/// Register `collector`, replacing any collector already registered under the same descriptors.
fn register_or_replace<C>(registry: &Registry, collector: C) -> prometheus::Result<C>
where
    C: Collector + Clone + 'static,
{
    let boxed = Box::new(collector.clone());
    match registry.register(boxed.clone()) {
        Ok(()) => {}
        Err(prometheus::Error::AlreadyReg) => {
            registry.unregister(boxed.clone())?;
            registry.register(boxed)?;
        }
        Err(e) => return Err(e),
    }

    Ok(collector)
}

/// Counters and timings of the scrape cycles run by the exporter
#[derive(Debug, Clone)]
pub struct ExporterMetrics {
    scrapes: IntCounter,
    timeouts: IntCounter,
    scrape_duration: Histogram,
    collector_failures: IntCounterVec,
    collector_duration: HistogramVec,
}

impl ExporterMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let scrapes = register_or_replace(
            registry,
            IntCounter::new("monero_exporter_scrapes_total", "number of scrape cycles run")?,
        )?;
        let timeouts = register_or_replace(
            registry,
            IntCounter::new(
                "monero_exporter_scrape_timeouts_total",
                "number of scrape cycles that hit their deadline",
            )?,
        )?;
        let scrape_duration = register_or_replace(
            registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "monero_exporter_scrape_duration_seconds",
                    "time taken by a whole scrape cycle",
                )
                .buckets(DURATION_BUCKETS.to_vec()),
            )?,
        )?;
        let collector_failures = register_or_replace(
            registry,
            IntCounterVec::new(
                Opts::new(
                    "monero_exporter_collector_failures_total",
                    "number of failed collector invocations",
                ),
                &["collector"],
            )?,
        )?;
        let collector_duration = register_or_replace(
            registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "monero_exporter_collector_duration_seconds",
                    "time taken by a collector invocation",
                )
                .buckets(DURATION_BUCKETS.to_vec()),
                &["collector"],
            )?,
        )?;

        Ok(Self { scrapes, timeouts, scrape_duration, collector_failures, collector_duration })
    }

    pub fn observe_scrape(&self, seconds: f64, timed_out: bool) {
        self.scrapes.inc();
        if timed_out {
            self.timeouts.inc();
        }
        self.scrape_duration.observe(seconds);
    }

    pub fn observe_collector(&self, collector: &str, seconds: f64, failed: bool) {
        if failed {
            self.collector_failures.with_label_values(&[collector]).inc();
        }
        self.collector_duration.with_label_values(&[collector]).observe(seconds);
    }
}

/// Register the CPU, memory, file descriptor and thread metrics of this process on `registry`
///
/// Registering twice on the same registry is a no-op.
#[cfg(all(feature = "process", target_os = "linux"))]
pub fn register_process_collector(registry: &Registry) -> prometheus::Result<()> {
    use prometheus::process_collector::ProcessCollector;

    match registry.register(Box::new(ProcessCollector::for_self())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}
