//! Station status endpoint.
//!
//! Serves a point-in-time snapshot of the pipeline counters and the most
//! recent observation as JSON.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tracing::debug;

use crate::status::{StationStatus, StatusSnapshot};

// ---

pub fn router() -> Router<Arc<StationStatus>> {
    // ---
    Router::new().route("/status", get(handler))
}

async fn handler(State(station): State<Arc<StationStatus>>) -> Json<StatusSnapshot> {
    // ---
    let snapshot = station.snapshot();
    debug!(state = snapshot.state, ticks = snapshot.ticks, "GET /status");
    Json(snapshot)
}
