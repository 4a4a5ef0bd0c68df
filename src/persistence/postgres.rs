use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, warn};

use super::Persistence;
use crate::error::PersistenceError;
use crate::models::{DailyStatistic, Observation};
use crate::report::local_day_bounds;

// ---

/// PostgreSQL-backed observation store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    // ---
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool of at most `max_connections`.
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, PersistenceError> {
        // ---
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Aggregate row for one local day.
#[derive(Debug, sqlx::FromRow)]
struct DayAggregate {
    observation_count: i64,
    air_temperature_avg: Option<f64>,
    air_temperature_min: Option<f64>,
    air_temperature_max: Option<f64>,
    relative_humidity_avg: Option<f64>,
    dew_point_avg: Option<f64>,
    wind_speed_avg: Option<f64>,
    wind_gust_max: Option<f64>,
    rainfall_total: Option<f64>,
    sunshine_duration_total: Option<i64>,
    msl_pressure_avg: Option<f64>,
}

#[async_trait]
impl Persistence for PgStore {
    async fn write_observation(&self, obs: &Observation) -> Result<(), PersistenceError> {
        // ---
        let result = sqlx::query(
            r#"
            INSERT INTO observation (
                time, air_temperature, relative_humidity, dew_point,
                wind_speed, wind_direction, wind_gust, rainfall,
                sunshine_duration, station_pressure, msl_pressure
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (time) DO NOTHING
            "#,
        )
        .bind(obs.time)
        .bind(obs.air_temperature)
        .bind(obs.relative_humidity)
        .bind(obs.dew_point)
        .bind(obs.wind_speed)
        .bind(obs.wind_direction.map(i32::from))
        .bind(obs.wind_gust)
        .bind(obs.rainfall)
        .bind(obs.sunshine_duration.map(|s| i32::try_from(s).unwrap_or(i32::MAX)))
        .bind(obs.station_pressure)
        .bind(obs.msl_pressure)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(time = %obs.time, "observation for this minute already stored, skipped");
        }
        Ok(())
    }

    async fn recompute_daily_statistic(
        &self,
        date: NaiveDate,
        tz: Tz,
    ) -> Result<DailyStatistic, PersistenceError> {
        // ---
        let (start, end) = local_day_bounds(date, tz).map_err(PersistenceError::TimeZone)?;
        debug!(%date, %tz, %start, %end, "recomputing daily statistic");

        // (start, end]: the 00:00 local observation closes the previous day
        let agg: DayAggregate = sqlx::query_as(
            r#"
            SELECT
                COUNT(*)                        AS observation_count,
                AVG(air_temperature)            AS air_temperature_avg,
                MIN(air_temperature)            AS air_temperature_min,
                MAX(air_temperature)            AS air_temperature_max,
                AVG(relative_humidity)          AS relative_humidity_avg,
                AVG(dew_point)                  AS dew_point_avg,
                AVG(wind_speed)                 AS wind_speed_avg,
                MAX(wind_gust)                  AS wind_gust_max,
                SUM(rainfall)                   AS rainfall_total,
                SUM(sunshine_duration)::BIGINT  AS sunshine_duration_total,
                AVG(msl_pressure)               AS msl_pressure_avg
            FROM observation
            WHERE time > $1 AND time <= $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(DailyStatistic {
            date,
            time_zone: tz.name().to_string(),
            observation_count: agg.observation_count,
            air_temperature_avg: agg.air_temperature_avg.map(round1),
            air_temperature_min: agg.air_temperature_min,
            air_temperature_max: agg.air_temperature_max,
            relative_humidity_avg: agg.relative_humidity_avg.map(round1),
            dew_point_avg: agg.dew_point_avg.map(round1),
            wind_speed_avg: agg.wind_speed_avg.map(round1),
            wind_gust_max: agg.wind_gust_max,
            rainfall_total: agg.rainfall_total.map(round1),
            sunshine_duration_total: agg.sunshine_duration_total,
            msl_pressure_avg: agg.msl_pressure_avg.map(round1),
        })
    }

    async fn write_daily_statistic(&self, stat: &DailyStatistic) -> Result<(), PersistenceError> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO daily_statistic (
                date, time_zone, observation_count,
                air_temperature_avg, air_temperature_min, air_temperature_max,
                relative_humidity_avg, dew_point_avg, wind_speed_avg, wind_gust_max,
                rainfall_total, sunshine_duration_total, msl_pressure_avg
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (date) DO UPDATE SET
                time_zone               = EXCLUDED.time_zone,
                observation_count       = EXCLUDED.observation_count,
                air_temperature_avg     = EXCLUDED.air_temperature_avg,
                air_temperature_min     = EXCLUDED.air_temperature_min,
                air_temperature_max     = EXCLUDED.air_temperature_max,
                relative_humidity_avg   = EXCLUDED.relative_humidity_avg,
                dew_point_avg           = EXCLUDED.dew_point_avg,
                wind_speed_avg          = EXCLUDED.wind_speed_avg,
                wind_gust_max           = EXCLUDED.wind_gust_max,
                rainfall_total          = EXCLUDED.rainfall_total,
                sunshine_duration_total = EXCLUDED.sunshine_duration_total,
                msl_pressure_avg        = EXCLUDED.msl_pressure_avg
            "#,
        )
        .bind(stat.date)
        .bind(&stat.time_zone)
        .bind(stat.observation_count)
        .bind(stat.air_temperature_avg)
        .bind(stat.air_temperature_min)
        .bind(stat.air_temperature_max)
        .bind(stat.relative_humidity_avg)
        .bind(stat.dew_point_avg)
        .bind(stat.wind_speed_avg)
        .bind(stat.wind_gust_max)
        .bind(stat.rainfall_total)
        .bind(stat.sunshine_duration_total)
        .bind(stat.msl_pressure_avg)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
