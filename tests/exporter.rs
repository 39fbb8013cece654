use anyhow::Result;
use common::{Flavor, MockCouchdb, sample, serve_exporter};
use couchdb_exporter::{
    collectors::registry::CollectorRegistry,
    couchdb::{CouchdbClient, CouchdbConfig},
};
use serde_json::Value;

mod common;

#[tokio::test]
async fn test_metrics_endpoint() -> Result<()> {
    let couch = MockCouchdb::start(Flavor::V2).await;
    let (url, handle) = serve_exporter(couch.registry()).await;

    let response = reqwest::get(format!("{url}/metrics")).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("text/plain; charset=utf-8")
    );
    assert!(response.headers().contains_key("x-request-id"));

    let body = response.text().await?;
    assert!(body.contains("# HELP couchdb_httpd_up Was the last query of CouchDB stats successful."));
    assert_eq!(sample(&body, "couchdb_httpd_up", &[]), Some(1.0));
    assert_eq!(
        sample(
            &body,
            "couchdb_httpd_request_methods",
            &[("method", "GET"), ("node_name", "node1@127.0.0.1")]
        ),
        Some(4712.0)
    );

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_every_scrape_polls_again() -> Result<()> {
    let couch = MockCouchdb::start(Flavor::V1).await;
    let (url, handle) = serve_exporter(couch.registry()).await;

    for _ in 0..3 {
        let response = reqwest::get(format!("{url}/metrics")).await?;
        assert_eq!(response.status(), 200);
    }

    assert_eq!(couch.request_count("/_stats"), 3);

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_with_couchdb_down() -> Result<()> {
    let client = CouchdbClient::new(CouchdbConfig::new("http://127.0.0.1:9"))?;
    let registry = CollectorRegistry::new(client, &common::all_collectors())?;
    let (url, handle) = serve_exporter(registry).await;

    let response = reqwest::get(format!("{url}/metrics")).await?;

    // the scrape itself succeeds, the target is reported down
    assert_eq!(response.status(), 200);
    let body = response.text().await?;
    assert_eq!(sample(&body, "couchdb_httpd_up", &[]), Some(0.0));
    assert!(!body.contains("couchdb_httpd_requests{"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_request_id_is_propagated() -> Result<()> {
    let couch = MockCouchdb::start(Flavor::V1).await;
    let (url, handle) = serve_exporter(couch.registry()).await;

    let response = reqwest::Client::new()
        .get(format!("{url}/health"))
        .header("x-request-id", "scrape-42")
        .send()
        .await?;

    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("scrape-42")
    );

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<()> {
    let couch = MockCouchdb::start(Flavor::V1).await;
    let (url, handle) = serve_exporter(couch.registry()).await;

    let response = reqwest::get(format!("{url}/health")).await?;

    assert_eq!(response.status(), 200);

    let x_app = response
        .headers()
        .get("x-app")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    assert!(x_app.is_some_and(|v| v.starts_with(&format!(
        "{}:{}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    ))));

    let body: Value = response.json().await?;
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["couchdb"], "ok");
    assert!(body["commit"].is_string());

    // health checks do not count as polls
    assert_eq!(couch.request_count("/_stats"), 0);

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_health_endpoint_options_request() -> Result<()> {
    let couch = MockCouchdb::start(Flavor::V2).await;
    let (url, handle) = serve_exporter(couch.registry()).await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{url}/health"))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.text().await?.is_empty());

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_health_endpoint_with_couchdb_down() -> Result<()> {
    let client = CouchdbClient::new(CouchdbConfig::new("http://127.0.0.1:9"))?;
    let registry = CollectorRegistry::new(client, &common::all_collectors())?;
    let (url, handle) = serve_exporter(registry).await;

    let response = reqwest::get(format!("{url}/health")).await?;

    assert_eq!(response.status(), 503);
    let body: Value = response.json().await?;
    assert_eq!(body["couchdb"], "error");

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_unknown_route() -> Result<()> {
    let couch = MockCouchdb::start(Flavor::V1).await;
    let (url, handle) = serve_exporter(couch.registry()).await;

    let response = reqwest::get(format!("{url}/does-not-exist")).await?;
    assert_eq!(response.status(), 404);

    handle.abort();

    Ok(())
}
