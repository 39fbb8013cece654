#![allow(dead_code)]

use axum::{
    Router,
    extract::{Path, Request, State},
    http::{StatusCode, header::AUTHORIZATION, header::CONTENT_TYPE},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::get,
};
use base64::{Engine, engine::general_purpose};
use couchdb_exporter::{
    collectors::{COLLECTOR_NAMES, config::CollectorConfig, registry::CollectorRegistry},
    couchdb::{CouchdbClient, CouchdbConfig},
};
use secrecy::SecretString;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tokio::{net::TcpListener, task::JoinHandle};

pub const USERNAME: &str = "root";
pub const PASSWORD: &str = "apple";
pub const DATABASES: [&str; 2] = ["_users", "orders"];

pub const ROOT_V1: &str = include_str!("../testdata/root-v1.json");
pub const ROOT_V2: &str = include_str!("../testdata/root-v2.json");
const MEMBERSHIP: &str = include_str!("../testdata/membership.json");
const STATS_V1: &str = include_str!("../testdata/stats-v1.json");
const STATS_V2: &str = include_str!("../testdata/stats-v2.json");
const DB_LEGACY: &str = include_str!("../testdata/db-legacy.json");
const DB_SIZES: &str = include_str!("../testdata/db-sizes.json");
const ACTIVE_TASKS_V1: &str = include_str!("../testdata/active-tasks-v1.json");
const ACTIVE_TASKS_V2: &str = include_str!("../testdata/active-tasks-v2.json");

const CLUSTER_NODES: [&str; 2] = ["node1@127.0.0.1", "node2@127.0.0.1"];

/// Which CouchDB generation the mock server pretends to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    V1,
    V2,
}

struct MockState {
    flavor: Flavor,
    root: String,
    fail_stats: AtomicBool,
    requests: Mutex<Vec<String>>,
}

/// In-process CouchDB serving canned documents behind basic auth
/// (`root`/`apple`). Stopped on drop.
pub struct MockCouchdb {
    pub uri: String,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockCouchdb {
    pub async fn start(flavor: Flavor) -> Self {
        let root = match flavor {
            Flavor::V1 => ROOT_V1,
            Flavor::V2 => ROOT_V2,
        };
        Self::with_root(flavor, root).await
    }

    /// Serve `root` as the welcome document instead of the flavor's default.
    pub async fn with_root(flavor: Flavor, root: &str) -> Self {
        let state = Arc::new(MockState {
            flavor,
            root: root.to_string(),
            fail_stats: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/", get(root_handler))
            .route("/_membership", get(membership))
            .route("/_stats", get(local_stats))
            .route("/_node/{node}/_stats", get(node_stats))
            .route("/_active_tasks", get(active_tasks))
            .route("/{db}", get(database))
            .layer(from_fn_with_state(state.clone(), basic_auth))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock couchdb");
        let addr = listener.local_addr().expect("mock couchdb addr");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock couchdb");
        });

        Self {
            uri: format!("http://{addr}"),
            state,
            handle,
        }
    }

    /// Make every `_stats` request answer 500 until switched back.
    pub fn fail_stats(&self, fail: bool) {
        self.state.fail_stats.store(fail, Ordering::SeqCst);
    }

    /// Paths requested so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().expect("request log").clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests().iter().filter(|p| *p == path).count()
    }

    pub fn clear_requests(&self) {
        self.state.requests.lock().expect("request log").clear();
    }

    /// Credentials and the fixture databases.
    pub fn config(&self) -> CouchdbConfig {
        CouchdbConfig::new(self.uri.as_str())
            .with_basic_auth(USERNAME, SecretString::from(PASSWORD.to_string()))
            .with_databases(DATABASES)
    }

    pub fn client(&self) -> CouchdbClient {
        CouchdbClient::new(self.config()).expect("client")
    }

    /// Registry with every collector enabled.
    pub fn registry(&self) -> CollectorRegistry {
        CollectorRegistry::new(self.client(), &all_collectors()).expect("registry")
    }
}

impl Drop for MockCouchdb {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn all_collectors() -> CollectorConfig {
    let names: Vec<String> = COLLECTOR_NAMES.iter().map(ToString::to_string).collect();
    CollectorConfig::new().with_enabled(&names)
}

fn json(status: StatusCode, body: impl Into<String>) -> Response {
    (status, [(CONTENT_TYPE, "application/json")], body.into()).into_response()
}

fn not_found() -> Response {
    json(
        StatusCode::NOT_FOUND,
        r#"{"error":"not_found","reason":"Database does not exist."}"#,
    )
}

async fn basic_auth(State(state): State<Arc<MockState>>, req: Request, next: Next) -> Response {
    state
        .requests
        .lock()
        .expect("request log")
        .push(req.uri().path().to_string());

    let expected = format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{USERNAME}:{PASSWORD}"))
    );

    let authorized = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    if !authorized {
        return json(
            StatusCode::UNAUTHORIZED,
            r#"{"error":"unauthorized","reason":"Authentication required."}"#,
        );
    }

    next.run(req).await
}

async fn root_handler(State(state): State<Arc<MockState>>) -> Response {
    json(StatusCode::OK, state.root.clone())
}

async fn membership(State(state): State<Arc<MockState>>) -> Response {
    match state.flavor {
        Flavor::V1 => not_found(),
        Flavor::V2 => json(StatusCode::OK, MEMBERSHIP),
    }
}

fn stats_failure(state: &MockState) -> Option<Response> {
    state.fail_stats.load(Ordering::SeqCst).then(|| {
        json(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"internal_server_error","reason":"stats unavailable"}"#,
        )
    })
}

async fn local_stats(State(state): State<Arc<MockState>>) -> Response {
    if let Some(failure) = stats_failure(&state) {
        return failure;
    }
    match state.flavor {
        Flavor::V1 => json(StatusCode::OK, STATS_V1),
        Flavor::V2 => not_found(),
    }
}

async fn node_stats(State(state): State<Arc<MockState>>, Path(node): Path<String>) -> Response {
    if let Some(failure) = stats_failure(&state) {
        return failure;
    }
    if state.flavor == Flavor::V2 && CLUSTER_NODES.contains(&node.as_str()) {
        json(StatusCode::OK, STATS_V2)
    } else {
        not_found()
    }
}

async fn active_tasks(State(state): State<Arc<MockState>>) -> Response {
    match state.flavor {
        Flavor::V1 => json(StatusCode::OK, ACTIVE_TASKS_V1),
        Flavor::V2 => json(StatusCode::OK, ACTIVE_TASKS_V2),
    }
}

async fn database(Path(db): Path<String>) -> Response {
    match db.as_str() {
        "_users" => json(StatusCode::OK, DB_LEGACY),
        "orders" => json(StatusCode::OK, DB_SIZES),
        _ => not_found(),
    }
}

/// Serve the exporter's router on an ephemeral port, returning its base url.
pub async fn serve_exporter(registry: CollectorRegistry) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind exporter");
    let addr = listener.local_addr().expect("exporter addr");

    let app = couchdb_exporter::exporter::app(registry);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("exporter");
    });

    (format!("http://{addr}"), handle)
}

/// Value of the series `name{labels}` in a text-format snapshot; label order
/// does not matter.
pub fn sample(output: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    let mut wanted: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    wanted.sort();

    output
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.rsplit_once(' '))
        .find_map(|(series, value)| {
            let (series_name, found) = parse_series(series);
            (series_name == name && found == wanted).then(|| value.parse::<f64>().ok())?
        })
}

/// Number of series of the metric family `name`.
pub fn series_count(output: &str, name: &str) -> usize {
    output
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.rsplit_once(' '))
        .filter(|(series, _)| parse_series(series).0 == name)
        .count()
}

fn parse_series(series: &str) -> (&str, Vec<(String, String)>) {
    let Some((name, rest)) = series.split_once('{') else {
        return (series, Vec::new());
    };

    let mut labels: Vec<(String, String)> = rest
        .trim_end_matches('}')
        .split("\",")
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((
                key.to_string(),
                value.trim_matches('"').to_string(),
            ))
        })
        .collect();
    labels.sort();

    (name, labels)
}
