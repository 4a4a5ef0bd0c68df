//! Database schema management for the station store.
//!
//! Ensures required tables and indexes exist before the pipeline starts.
//! Applied once on startup from `main.rs`.

use sqlx::PgPool;

use crate::error::PersistenceError;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `observation` table for per-minute records and the
/// `daily_statistic` table for local-day aggregates. Safe to call on every
/// startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<(), PersistenceError> {
    // ---
    let mut tx = pool.begin().await?;

    // One row per UTC minute; every measured field is optional
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observation (
            time              TIMESTAMPTZ PRIMARY KEY,
            air_temperature   DOUBLE PRECISION,
            relative_humidity DOUBLE PRECISION,
            dew_point         DOUBLE PRECISION,
            wind_speed        DOUBLE PRECISION,
            wind_direction    INTEGER,
            wind_gust         DOUBLE PRECISION,
            rainfall          DOUBLE PRECISION,
            sunshine_duration INTEGER,
            station_pressure  DOUBLE PRECISION,
            msl_pressure      DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Local-day aggregates, recomputed by the reporting worker
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_statistic (
            date                    DATE PRIMARY KEY,
            time_zone               TEXT             NOT NULL,
            observation_count       BIGINT           NOT NULL,
            air_temperature_avg     DOUBLE PRECISION,
            air_temperature_min     DOUBLE PRECISION,
            air_temperature_max     DOUBLE PRECISION,
            relative_humidity_avg   DOUBLE PRECISION,
            dew_point_avg           DOUBLE PRECISION,
            wind_speed_avg          DOUBLE PRECISION,
            wind_gust_max           DOUBLE PRECISION,
            rainfall_total          DOUBLE PRECISION,
            sunshine_duration_total BIGINT,
            msl_pressure_avg        DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
