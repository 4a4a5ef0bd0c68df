//! HTTP gateway for the station's local diagnostic surface.
//!
//! Each sibling module exports a subrouter; this gateway merges them and
//! attaches the shared [`StationStatus`] as router state.

use std::sync::Arc;

use axum::Router;

use crate::status::StationStatus;

mod health;
mod status;

// ---

pub fn router(station: Arc<StationStatus>) -> Router {
    // ---
    Router::new()
        .merge(status::router())
        .merge(health::router())
        .with_state(station)
}
