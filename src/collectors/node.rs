use crate::collectors::Collector;
use crate::couchdb::Stats;
use anyhow::Result;
use prometheus::{GaugeVec, Opts, Registry};
use tracing::{debug, instrument};

/// Per-node server counters from `_stats`.
///
/// **Metrics** (all labelled with `node_name`):
/// - `couchdb_httpd_auth_cache_hits`, `couchdb_httpd_auth_cache_misses`
/// - `couchdb_httpd_database_reads`, `couchdb_httpd_database_writes`
/// - `couchdb_httpd_open_databases`, `couchdb_httpd_open_os_files`
/// - `couchdb_httpd_request_time`
/// - `couchdb_httpd_status_codes` {code}, only the exported codes the node reported
/// - `couchdb_httpd_request_methods` {method}, always COPY/DELETE/GET/HEAD/POST/PUT
/// - `couchdb_httpd_bulk_requests`, `couchdb_httpd_clients_requesting_changes`,
///   `couchdb_httpd_requests`, `couchdb_httpd_temporary_view_reads`,
///   `couchdb_httpd_view_reads`
///
/// Values are the server's own counters, exported as gauges; use `rate()` in
/// PromQL for per-second figures.
#[derive(Clone)]
pub struct NodeCollector {
    auth_cache_hits: GaugeVec,
    auth_cache_misses: GaugeVec,
    database_reads: GaugeVec,
    database_writes: GaugeVec,
    open_databases: GaugeVec,
    open_os_files: GaugeVec,
    request_time: GaugeVec,

    status_codes: GaugeVec,
    request_methods: GaugeVec,

    bulk_requests: GaugeVec,
    clients_requesting_changes: GaugeVec,
    requests: GaugeVec,
    temporary_view_reads: GaugeVec,
    view_reads: GaugeVec,
}

impl Default for NodeCollector {
    fn default() -> Self {
        Self::new()
    }
}

const NODE_LABELS: [&str; 1] = ["node_name"];

#[allow(clippy::expect_used)]
fn labelled_gauge(metric: &str, help: &str, labels: &[&str]) -> GaugeVec {
    GaugeVec::new(Opts::new(metric, help), labels).expect("valid node metric opts")
}

fn node_gauge(metric: &str, help: &str) -> GaugeVec {
    labelled_gauge(metric, help, &NODE_LABELS)
}

impl NodeCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            auth_cache_hits: node_gauge(
                "couchdb_httpd_auth_cache_hits",
                "number of authentication cache hits",
            ),
            auth_cache_misses: node_gauge(
                "couchdb_httpd_auth_cache_misses",
                "number of authentication cache misses",
            ),
            database_reads: node_gauge(
                "couchdb_httpd_database_reads",
                "number of times a document was read from a database",
            ),
            database_writes: node_gauge(
                "couchdb_httpd_database_writes",
                "number of times a database was changed",
            ),
            open_databases: node_gauge(
                "couchdb_httpd_open_databases",
                "number of open databases",
            ),
            open_os_files: node_gauge(
                "couchdb_httpd_open_os_files",
                "number of file descriptors CouchDB has open",
            ),
            request_time: node_gauge(
                "couchdb_httpd_request_time",
                "length of a request inside CouchDB without MochiWeb",
            ),
            status_codes: labelled_gauge(
                "couchdb_httpd_status_codes",
                "number of HTTP responses by status code",
                &["code", "node_name"],
            ),
            request_methods: labelled_gauge(
                "couchdb_httpd_request_methods",
                "number of HTTP requests by method",
                &["method", "node_name"],
            ),
            bulk_requests: node_gauge(
                "couchdb_httpd_bulk_requests",
                "number of bulk requests",
            ),
            clients_requesting_changes: node_gauge(
                "couchdb_httpd_clients_requesting_changes",
                "number of clients for continuous _changes",
            ),
            requests: node_gauge("couchdb_httpd_requests", "number of HTTP requests"),
            temporary_view_reads: node_gauge(
                "couchdb_httpd_temporary_view_reads",
                "number of temporary view reads",
            ),
            view_reads: node_gauge("couchdb_httpd_view_reads", "number of view reads"),
        }
    }

    fn gauges(&self) -> [&GaugeVec; 14] {
        [
            &self.auth_cache_hits,
            &self.auth_cache_misses,
            &self.database_reads,
            &self.database_writes,
            &self.open_databases,
            &self.open_os_files,
            &self.request_time,
            &self.status_codes,
            &self.request_methods,
            &self.bulk_requests,
            &self.clients_requesting_changes,
            &self.requests,
            &self.temporary_view_reads,
            &self.view_reads,
        ]
    }
}

impl Collector for NodeCollector {
    fn name(&self) -> &'static str {
        "node"
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        for gauge in self.gauges() {
            registry.register(Box::new(gauge.clone()))?;
        }
        Ok(())
    }

    fn reset(&self) {
        for gauge in self.gauges() {
            gauge.reset();
        }
    }

    #[instrument(skip(self, stats), level = "debug", fields(collector = "node"))]
    fn update(&self, stats: &Stats) {
        for (name, node) in &stats.stats_by_node_name {
            let labels = [name.as_str()];

            self.auth_cache_hits.with_label_values(&labels).set(node.auth_cache_hits);
            self.auth_cache_misses.with_label_values(&labels).set(node.auth_cache_misses);
            self.database_reads.with_label_values(&labels).set(node.database_reads);
            self.database_writes.with_label_values(&labels).set(node.database_writes);
            self.open_databases.with_label_values(&labels).set(node.open_databases);
            self.open_os_files.with_label_values(&labels).set(node.open_os_files);
            self.request_time.with_label_values(&labels).set(node.request_time);

            for (code, value) in &node.status_codes {
                self.status_codes.with_label_values(&[*code, name.as_str()]).set(*value);
            }

            for (method, value) in &node.request_methods {
                self.request_methods.with_label_values(&[*method, name.as_str()]).set(*value);
            }

            self.bulk_requests.with_label_values(&labels).set(node.bulk_requests);
            self.clients_requesting_changes
                .with_label_values(&labels)
                .set(node.clients_requesting_changes);
            self.requests.with_label_values(&labels).set(node.requests);
            self.temporary_view_reads
                .with_label_values(&labels)
                .set(node.temporary_view_reads);
            self.view_reads.with_label_values(&labels).set(node.view_reads);

            debug!(node = %name, "node metrics updated");
        }
    }
}
