use anyhow::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::time::Instant;

/// Exporter self-monitoring: how long polls take and how often they fail.
///
/// - `couchdb_exporter_scrape_duration_seconds` (Histogram)
/// - `couchdb_exporter_scrape_errors_total` (Counter)
/// - `couchdb_exporter_scrapes_total` (Counter)
///
/// ```promql
/// # p99 poll latency
/// histogram_quantile(0.99, rate(couchdb_exporter_scrape_duration_seconds_bucket[5m]))
///
/// # failing polls
/// rate(couchdb_exporter_scrape_errors_total[5m]) > 0
/// ```
#[derive(Clone)]
pub struct ScraperCollector {
    scrape_duration_seconds: Histogram,
    scrape_errors_total: IntCounter,
    scrapes_total: IntCounter,
}

impl Default for ScraperCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ScraperCollector {
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with valid metric names)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let scrape_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "couchdb_exporter_scrape_duration_seconds",
                "Time spent polling CouchDB in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )
        .expect("couchdb_exporter_scrape_duration_seconds");

        let scrape_errors_total = IntCounter::with_opts(Opts::new(
            "couchdb_exporter_scrape_errors_total",
            "Total number of failed polls",
        ))
        .expect("couchdb_exporter_scrape_errors_total");

        let scrapes_total = IntCounter::with_opts(Opts::new(
            "couchdb_exporter_scrapes_total",
            "Total number of polls performed since start",
        ))
        .expect("couchdb_exporter_scrapes_total");

        Self {
            scrape_duration_seconds,
            scrape_errors_total,
            scrapes_total,
        }
    }

    /// Start timing one poll.
    #[must_use]
    pub fn start_scrape(&self) -> ScrapeTimer {
        self.scrapes_total.inc();
        ScrapeTimer {
            start: Instant::now(),
            scraper: self.clone(),
            finished: false,
        }
    }

    /// # Errors
    ///
    /// Returns an error if any metric fails to register
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.scrape_duration_seconds.clone()))?;
        registry.register(Box::new(self.scrape_errors_total.clone()))?;
        registry.register(Box::new(self.scrapes_total.clone()))?;
        Ok(())
    }

    #[must_use]
    pub fn scrapes(&self) -> u64 {
        self.scrapes_total.get()
    }

    #[must_use]
    pub fn errors(&self) -> u64 {
        self.scrape_errors_total.get()
    }
}

/// RAII timer for one poll. Records the duration when finished; a timer
/// dropped without [`ScrapeTimer::success`] or [`ScrapeTimer::error`] counts
/// as a success.
pub struct ScrapeTimer {
    start: Instant,
    scraper: ScraperCollector,
    finished: bool,
}

impl ScrapeTimer {
    pub fn success(mut self) {
        self.finish();
    }

    pub fn error(mut self) {
        self.scraper.scrape_errors_total.inc();
        self.finish();
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.scraper
                .scrape_duration_seconds
                .observe(self.start.elapsed().as_secs_f64());
        }
    }
}

impl Drop for ScrapeTimer {
    fn drop(&mut self) {
        self.finish();
    }
}
