//! Application entry point for the `codemetal-weatherstation` service.
//!
//! Startup sequence:
//! - Initializing structured logging/tracing
//! - Loading configuration from environment variables or `.env`
//! - Establishing a PostgreSQL connection pool and creating the schema
//! - Opening the clock and attaching the sensors
//! - Spawning the reporting worker and starting the tick source
//! - Serving the status routes via the `routes` gateway (EMBP pattern)
//!
//! The pipeline then runs until Ctrl-C; queued minutes are still reported
//! before the process exits.
//!
//! # Environment Variables
//! See [`weatherstation::config::load_from_env`], plus:
//! - `STATION_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `STATION_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, io::IsTerminal, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use chrono::Utc;
use dotenvy::dotenv;
use tokio::sync::mpsc;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use weatherstation::clock::simulated::{IntervalAlarmLine, SimulatedRtc};
use weatherstation::clock::TickSource;
use weatherstation::indicator::TracingIndicator;
use weatherstation::persistence::{create_schema, PgStore};
use weatherstation::sensors::simulated::bench_station;
use weatherstation::status::StationStatus;
use weatherstation::{config, routes, Pipeline};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let store = PgStore::connect(&cfg.db_url, cfg.db_pool_max)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;
    tracing::info!("Successfully connected to database");

    create_schema(store.pool()).await?;

    let sensors = bench_station(&cfg.enabled_sensors);

    // No RTC hardware on this host: run on the simulated clock
    let rtc = SimulatedRtc::new(Utc::now());
    let line = IntervalAlarmLine::new(Duration::from_secs(1));
    let source = TickSource::open(rtc, line).map_err(|e| anyhow!("Clock unavailable: {}", e))?;

    let status = Arc::new(StationStatus::new());
    let (pipeline, reporter) = Pipeline::new(
        cfg.station_settings(),
        sensors,
        Arc::new(store),
        Arc::new(TracingIndicator),
        status.clone(),
    );
    let reporter = reporter.spawn();

    let (tick_tx, tick_rx) = mpsc::channel(cfg.tick_queue_depth);
    let clock = source
        .start(tick_tx)
        .map_err(|e| anyhow!("Clock unavailable: {}", e))?;

    let listener = tokio::net::TcpListener::bind(cfg.status_addr).await?;
    tracing::info!("Listening on {}", cfg.status_addr);
    let app = routes::router(status);
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    tokio::select! {
        _ = pipeline.run(tick_rx) => tracing::warn!("tick source stopped"),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutdown requested");
        }
    }

    // Pipeline is gone: the clock stops on its next send, the worker after draining
    match clock.await {
        Ok(Ok(())) => {}
        Ok(Err(fault)) => tracing::error!(error = %fault, "clock failed"),
        Err(e) => tracing::error!(error = %e, "clock task panicked"),
    }
    if let Err(e) = reporter.await {
        tracing::error!(error = %e, "reporting worker panicked");
    }
    server.abort();

    tracing::info!("Station stopped");
    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Color output: `FORCE_COLOR=1|true|yes` forces it on, `0|false|no` off,
///   otherwise TTY detection decides
/// - Span events from `STATION_SPAN_EVENTS`:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level from `RUST_LOG`, else `STATION_LOG_LEVEL`
///
/// Call once at startup before any tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("STATION_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to STATION_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("STATION_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
