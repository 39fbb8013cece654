//! Per-node statistics (`GET /_stats`, `GET /_node/{name}/_stats`).
//!
//! The two API generations disagree on the shape of this document:
//!
//! - 1.x keeps `httpd_request_methods`, `httpd_status_codes` and `httpd` at
//!   the top level and every counter stores its reading in `current`, which
//!   is `null` until the first sample.
//! - 2.x nests those three sections under `couchdb` and every counter stores
//!   its reading in `value`; histograms such as `request_time` carry an
//!   object there, of which the arithmetic mean is reported.
//!
//! Both are decoded into the same raw tree and folded into [`NodeStats`].

use super::{
    client::CouchdbClient,
    error::{FetchError, FetchResult},
    topology::Topology,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

/// Status codes exported per node; anything else the server reports is dropped.
pub const EXPOSED_HTTP_STATUS_CODES: [&str; 13] = [
    "200", "201", "202", "301", "304", "400", "401", "403", "404", "405", "409", "412", "500",
];

/// Request methods exported per node, always all of them.
pub const HTTP_METHODS: [&str; 6] = ["COPY", "DELETE", "GET", "HEAD", "POST", "PUT"];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Histogram {
        #[serde(default)]
        arithmetic_mean: f64,
    },
}

/// One counter, either flavour.
#[derive(Debug, Default, Deserialize)]
struct RawCounter {
    #[serde(default)]
    current: Option<f64>,
    #[serde(default)]
    value: Option<RawValue>,
}

impl RawCounter {
    fn reading(&self) -> f64 {
        match (&self.value, self.current) {
            (Some(RawValue::Number(n)), _) => *n,
            (Some(RawValue::Histogram { arithmetic_mean }), _) => *arithmetic_mean,
            (_, Some(current)) => current,
            _ => 0.0,
        }
    }
}

type RawSection = HashMap<String, RawCounter>;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHttpd {
    bulk_requests: RawCounter,
    clients_requesting_changes: RawCounter,
    requests: RawCounter,
    temporary_view_reads: RawCounter,
    view_reads: RawCounter,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCouchdb {
    auth_cache_hits: RawCounter,
    auth_cache_misses: RawCounter,
    database_reads: RawCounter,
    database_writes: RawCounter,
    open_databases: RawCounter,
    open_os_files: RawCounter,
    request_time: RawCounter,
    // 2.x
    httpd_request_methods: Option<RawSection>,
    httpd_status_codes: Option<RawSection>,
    httpd: Option<RawHttpd>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStatsResponse {
    couchdb: RawCouchdb,
    // 1.x
    httpd_request_methods: Option<RawSection>,
    httpd_status_codes: Option<RawSection>,
    httpd: Option<RawHttpd>,
}

/// Point-in-time counters of one node, independent of the API generation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeStats {
    pub auth_cache_hits: f64,
    pub auth_cache_misses: f64,
    pub database_reads: f64,
    pub database_writes: f64,
    pub open_databases: f64,
    pub open_os_files: f64,
    pub request_time: f64,
    /// Only codes from [`EXPOSED_HTTP_STATUS_CODES`] that the server reported.
    pub status_codes: BTreeMap<&'static str, f64>,
    /// Every method of [`HTTP_METHODS`], 0 when not reported.
    pub request_methods: BTreeMap<&'static str, f64>,
    pub bulk_requests: f64,
    pub clients_requesting_changes: f64,
    pub requests: f64,
    pub temporary_view_reads: f64,
    pub view_reads: f64,
}

impl NodeStats {
    /// Decode a `_stats` document of either generation.
    ///
    /// # Errors
    ///
    /// [`FetchError::Decode`] if the body is not a JSON object of the
    /// expected shape.
    pub fn from_slice(body: &[u8]) -> FetchResult<Self> {
        let raw: RawStatsResponse =
            serde_json::from_slice(body).map_err(|e| FetchError::decode("node stats", &e))?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawStatsResponse) -> Self {
        let RawStatsResponse {
            couchdb,
            httpd_request_methods,
            httpd_status_codes,
            httpd,
        } = raw;

        // The nested 2.x sections win over the top-level 1.x ones.
        let methods = couchdb
            .httpd_request_methods
            .or(httpd_request_methods)
            .unwrap_or_default();
        let codes = couchdb
            .httpd_status_codes
            .or(httpd_status_codes)
            .unwrap_or_default();
        let httpd = couchdb.httpd.or(httpd).unwrap_or_default();

        let request_methods = HTTP_METHODS
            .iter()
            .map(|&method| (method, methods.get(method).map_or(0.0, RawCounter::reading)))
            .collect();

        let status_codes = EXPOSED_HTTP_STATUS_CODES
            .iter()
            .filter_map(|&code| codes.get(code).map(|c| (code, c.reading())))
            .collect();

        Self {
            auth_cache_hits: couchdb.auth_cache_hits.reading(),
            auth_cache_misses: couchdb.auth_cache_misses.reading(),
            database_reads: couchdb.database_reads.reading(),
            database_writes: couchdb.database_writes.reading(),
            open_databases: couchdb.open_databases.reading(),
            open_os_files: couchdb.open_os_files.reading(),
            request_time: couchdb.request_time.reading(),
            status_codes,
            request_methods,
            bulk_requests: httpd.bulk_requests.reading(),
            clients_requesting_changes: httpd.clients_requesting_changes.reading(),
            requests: httpd.requests.reading(),
            temporary_view_reads: httpd.temporary_view_reads.reading(),
            view_reads: httpd.view_reads.reading(),
        }
    }
}

/// Fetch `_stats` for every node of the topology. The first failing node
/// aborts the whole fetch; there are no partial results.
///
/// # Errors
///
/// The first fetch or decode error encountered.
#[instrument(skip(client, topology), level = "info", err, fields(nodes = topology.len()))]
pub async fn fetch_node_stats(
    client: &CouchdbClient,
    topology: &Topology,
) -> FetchResult<BTreeMap<String, NodeStats>> {
    let mut stats_by_node_name = BTreeMap::new();

    for (name, node_uri) in topology {
        let uri = CouchdbClient::endpoint(node_uri, &["_stats"])?;
        let body = client.request(&uri).await?;
        let stats = NodeStats::from_slice(&body)?;

        debug!(node = %name, requests = stats.requests, "node stats");

        stats_by_node_name.insert(name.clone(), stats);
    }

    Ok(stats_by_node_name)
}
