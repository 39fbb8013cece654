use crate::collectors::{
    Collector, CollectorType, all_factories, config::CollectorConfig, scraper::ScraperCollector,
};
use crate::couchdb::CouchdbClient;
use anyhow::{Context, Result};
use prometheus::{Gauge, Opts, Registry, TextEncoder, proto::MetricFamily};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info_span, instrument};
use tracing_futures::Instrument as _;

/// Owns the gauge set and runs polls against one CouchDB server.
///
/// Polls are serialized: a scrape arriving while another one polls waits for
/// it and then runs its own, so the values of two polls never mix.
#[derive(Clone)]
pub struct CollectorRegistry {
    client: Arc<CouchdbClient>,
    collectors: Vec<CollectorType>,
    registry: Registry,
    up: Gauge,
    scraper: ScraperCollector,
    poll_lock: Arc<Mutex<()>>,
}

impl CollectorRegistry {
    /// Build the enabled collectors and register their gauges.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric cannot be created or registered.
    pub fn new(client: CouchdbClient, config: &CollectorConfig) -> Result<Self> {
        let registry = Registry::new();

        let up = Gauge::with_opts(Opts::new(
            "couchdb_httpd_up",
            "Was the last query of CouchDB stats successful.",
        ))
        .context("failed to create couchdb_httpd_up")?;
        registry
            .register(Box::new(up.clone()))
            .context("failed to register couchdb_httpd_up")?;

        let factories = all_factories();
        let collectors: Vec<CollectorType> = crate::collectors::COLLECTOR_NAMES
            .iter()
            .filter(|name| config.is_enabled(name))
            .filter_map(|name| factories.get(name).map(|f| f()))
            .collect();

        for collector in &collectors {
            collector
                .register_metrics(&registry)
                .with_context(|| format!("failed to register '{}' metrics", collector.name()))?;
            debug!(collector = collector.name(), "registered metrics");
        }

        let scraper = ScraperCollector::new();
        scraper
            .register(&registry)
            .context("failed to register scraper metrics")?;

        Ok(Self {
            client: Arc::new(client),
            collectors,
            registry,
            up,
            scraper,
            poll_lock: Arc::new(Mutex::new(())),
        })
    }

    #[must_use]
    pub fn client(&self) -> &CouchdbClient {
        &self.client
    }

    #[must_use]
    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(Collector::name).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Poll CouchDB once and return the resulting snapshot.
    ///
    /// `couchdb_httpd_up` is 0 until every step of the poll succeeded and is
    /// part of the snapshot either way. A failed poll is logged here and
    /// leaves every other gauge empty.
    #[instrument(skip(self), level = "info", fields(otel.kind = "internal"))]
    pub async fn collect(&self) -> Vec<MetricFamily> {
        let _guard = self.poll_lock.lock().await;

        let timer = self.scraper.start_scrape();

        self.up.set(0.0);
        for collector in &self.collectors {
            collector.reset();
        }

        let span = info_span!("couchdb.poll", couchdb.uri = %self.client.base_uri());
        match self.client.get_stats().instrument(span).await {
            Ok(stats) => {
                for collector in &self.collectors {
                    collector.update(&stats);
                }
                self.up.set(1.0);
                timer.success();
            }
            Err(e) => {
                error!(error = %e, "Error collecting stats");
                timer.error();
            }
        }

        self.registry.gather()
    }

    /// [`CollectorRegistry::collect`] rendered in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be encoded.
    pub async fn collect_all(&self) -> Result<String> {
        let families = self.collect().await;

        let mut output = String::new();
        TextEncoder::new()
            .encode_utf8(&families, &mut output)
            .context("failed to encode metrics")?;

        Ok(output)
    }
}
