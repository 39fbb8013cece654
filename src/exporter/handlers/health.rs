use crate::{collectors::registry::CollectorRegistry, exporter::GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    couchdb: String,
}

impl Health {
    fn new(couchdb_ok: bool) -> Self {
        Self {
            commit: GIT_COMMIT_HASH.to_string(),
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            couchdb: if couchdb_ok { "ok" } else { "error" }.to_string(),
        }
    }

    /// `name:version:short_hash`, the hash left empty when unknown
    fn x_app(&self) -> HeaderMap {
        let short_hash = self.commit.get(..7).filter(|_| self.commit.len() > 7).unwrap_or("");

        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&format!("{}:{}:{short_hash}", self.name, self.version)) {
            Ok(value) => {
                headers.insert("X-App", value);
            }
            Err(e) => debug!(error = %e, "Failed to build X-App header"),
        }
        headers
    }
}

/// `GET|OPTIONS /health`: 200 when the CouchDB root answers, 503 otherwise.
pub async fn health(
    method: Method,
    Extension(registry): Extension<CollectorRegistry>,
) -> impl IntoResponse {
    let couchdb_ok = match registry.client().ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "CouchDB is unreachable");
            false
        }
    };

    let health = Health::new(couchdb_ok);
    let headers = health.x_app();

    let body = if method == Method::GET {
        Json(&health).into_response().into_body()
    } else {
        Body::empty()
    };

    let status = if couchdb_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, headers, body)
}
