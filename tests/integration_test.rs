use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use weatherstation::routes;
use weatherstation::status::StationStatus;
use weatherstation::Observation;

#[derive(Debug, Deserialize)]
struct StatusBody {
    state: String,
    started_at: Option<chrono::DateTime<Utc>>,
    ticks: u64,
    observations_logged: u64,
    report_failures: u64,
    reports_dropped: u64,
    last_error: Option<String>,
    last_observation: Option<Observation>,
}

/// Serve the router on an ephemeral port and return its address.
async fn serve(status: Arc<StationStatus>) -> Result<SocketAddr> {
    // ---
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = routes::router(status);
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(addr)
}

#[tokio::test]
async fn health_endpoint_ok() -> Result<()> {
    // ---
    let addr = serve(Arc::new(StationStatus::new())).await?;

    let response = tokio_test::assert_ok!(
        Client::new()
            .get(format!("http://{addr}/health"))
            .send()
            .await
    );
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
    Ok(())
}

#[tokio::test]
async fn status_endpoint_reports_idle_station() -> Result<()> {
    // ---
    let addr = serve(Arc::new(StationStatus::new())).await?;

    let body: StatusBody = Client::new()
        .get(format!("http://{addr}/status"))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body.state, "idle");
    assert_eq!(body.started_at, None);
    assert_eq!(body.ticks, 0);
    assert_eq!(body.observations_logged, 0);
    assert!(body.last_observation.is_none());
    Ok(())
}

#[tokio::test]
async fn status_endpoint_reflects_pipeline_activity() -> Result<()> {
    // ---
    let status = Arc::new(StationStatus::new());
    let addr = serve(status.clone()).await?;

    let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let mut obs = Observation::empty(start + chrono::Duration::minutes(1));
    obs.air_temperature = Some(18.5);

    for _ in 0..61 {
        status.record_tick();
    }
    status.record_start(start);
    status.record_logged(&obs);
    status.record_dropped("reporting worker is behind");

    let body: StatusBody = Client::new()
        .get(format!("http://{addr}/status"))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body.state, "sampling");
    assert_eq!(body.started_at, Some(start));
    assert_eq!(body.ticks, 61);
    assert_eq!(body.observations_logged, 1);
    assert_eq!(body.report_failures, 0);
    assert_eq!(body.reports_dropped, 1);
    assert_eq!(body.last_error.as_deref(), Some("reporting worker is behind"));
    assert_eq!(body.last_observation, Some(obs));
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_not_found() -> Result<()> {
    // ---
    let addr = serve(Arc::new(StationStatus::new())).await?;

    let response = tokio_test::assert_ok!(
        Client::new()
            .get(format!("http://{addr}/readings"))
            .send()
            .await
    );
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    Ok(())
}
