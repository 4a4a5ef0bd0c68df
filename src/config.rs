//! Configuration loader for the `codemetal-weatherstation` service.
//!
//! All runtime configuration values and their defaults are loaded here from
//! environment variables (with optional `.env` file support provided by the
//! caller), so the rest of the crate never touches `env::var` directly.
//!
use std::collections::BTreeSet;
use std::env;
use std::net::SocketAddr;

use anyhow::{anyhow, Result};
use chrono_tz::Tz;

use crate::buffer::Channel;
use crate::pipeline::StationSettings;

/// Parse an optional environment variable of type `$ty` with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration, immutable after loading.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Station elevation above mean sea level, metres.
    pub elevation_m: f64,

    /// Local time zone used for daily statistics.
    pub time_zone: Tz,

    /// Channels that get a sensor attached.
    pub enabled_sensors: BTreeSet<Channel>,

    /// Ticks buffered between the tick source and the pipeline.
    pub tick_queue_depth: usize,

    /// Finished minutes buffered for the reporting worker.
    pub report_queue_depth: usize,

    /// Bind address of the status HTTP surface.
    pub status_addr: SocketAddr,
}

const DEFAULT_STATUS_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
    8080,
);

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `STATION_ELEVATION_M` – elevation in metres (default: 0.0)
/// - `STATION_TIME_ZONE` – IANA zone name (default: `UTC`)
/// - `ENABLED_SENSORS` – comma separated channel names (default: all)
/// - `TICK_QUEUE_DEPTH` – default 8
/// - `REPORT_QUEUE_DEPTH` – default 1
/// - `STATUS_ADDR` – default `0.0.0.0:8080`
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env!("DB_POOL_MAX", u32, 5);
    let elevation_m = parse_env!("STATION_ELEVATION_M", f64, 0.0);
    let time_zone = parse_env!("STATION_TIME_ZONE", Tz, Tz::UTC);
    let tick_queue_depth = parse_env!("TICK_QUEUE_DEPTH", usize, 8);
    let report_queue_depth = parse_env!("REPORT_QUEUE_DEPTH", usize, 1);
    let status_addr = parse_env!("STATUS_ADDR", SocketAddr, DEFAULT_STATUS_ADDR);

    let enabled_sensors = match env::var("ENABLED_SENSORS") {
        Ok(list) => parse_channels(&list)?,
        Err(_) => Channel::ALL.into_iter().collect(),
    };

    if !elevation_m.is_finite() {
        return Err(anyhow!("Invalid STATION_ELEVATION_M: {}", elevation_m));
    }
    if tick_queue_depth == 0 || report_queue_depth == 0 {
        return Err(anyhow!("TICK_QUEUE_DEPTH and REPORT_QUEUE_DEPTH must be at least 1"));
    }

    Ok(Config {
        db_url,
        db_pool_max,
        elevation_m,
        time_zone,
        enabled_sensors,
        tick_queue_depth,
        report_queue_depth,
        status_addr,
    })
}

/// Parse a comma separated channel list; blanks are skipped.
pub fn parse_channels(list: &str) -> Result<BTreeSet<Channel>> {
    // ---
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<Channel>()
                .map_err(|e| anyhow!("Invalid ENABLED_SENSORS: {}", e))
        })
        .collect()
}

impl Config {
    /// Station parameters handed to the pipeline.
    pub fn station_settings(&self) -> StationSettings {
        StationSettings {
            elevation_m: self.elevation_m,
            time_zone: self.time_zone,
            report_queue_depth: self.report_queue_depth,
        }
    }

    /// Log the loaded configuration with the database password masked.
    pub fn log_config(&self) {
        // ---
        let enabled: Vec<&str> = self.enabled_sensors.iter().map(|c| c.name()).collect();

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL        : {}", mask_password(&self.db_url));
        tracing::info!("  DB_POOL_MAX         : {}", self.db_pool_max);
        tracing::info!("  STATION_ELEVATION_M : {}", self.elevation_m);
        tracing::info!("  STATION_TIME_ZONE   : {}", self.time_zone);
        tracing::info!("  ENABLED_SENSORS     : {}", enabled.join(","));
        tracing::info!("  TICK_QUEUE_DEPTH    : {}", self.tick_queue_depth);
        tracing::info!("  REPORT_QUEUE_DEPTH  : {}", self.report_queue_depth);
        tracing::info!("  STATUS_ADDR         : {}", self.status_addr);
    }
}

fn mask_password(db_url: &str) -> String {
    // ---
    let userinfo_start = db_url.find("://").map_or(0, |p| p + 3);
    let Some(at_pos) = db_url.rfind('@').filter(|p| *p >= userinfo_start) else {
        return db_url.to_string();
    };
    match db_url[userinfo_start..at_pos].find(':') {
        Some(offset) => {
            let colon_pos = userinfo_start + offset;
            format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..])
        }
        None => db_url.to_string(),
    }
}
