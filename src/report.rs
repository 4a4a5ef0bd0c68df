//! Per-minute observation building.
//!
//! Turns one minute's [`Bank`] plus the current [`WindSummary`] into an
//! [`Observation`], and decides which local days need their daily statistic
//! recomputed after the observation is logged.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::buffer::Bank;
use crate::error::ReportError;
use crate::models::Observation;
use crate::wind::{WindSummary, WINDOW_SECONDS};

// ---

/// Builds observations for a station at a fixed elevation.
#[derive(Debug, Clone, Copy)]
pub struct ReportBuilder {
    elevation_m: f64,
}

impl ReportBuilder {
    // ---
    pub fn new(elevation_m: f64) -> Self {
        Self { elevation_m }
    }

    /// Build the observation for the minute ending at `time`.
    ///
    /// Wind fields are only filled once a full ten-minute window can exist,
    /// i.e. `time >= start_time + 10min`.
    pub fn build(
        &self,
        time: DateTime<Utc>,
        start_time: DateTime<Utc>,
        bank: &Bank,
        wind: WindSummary,
    ) -> Result<Observation, ReportError> {
        // ---
        if time.second() != 0 || time.nanosecond() != 0 {
            return Err(ReportError::Build(format!(
                "observation time {time} is not minute-aligned"
            )));
        }

        let mut obs = Observation::empty(time);

        obs.air_temperature = mean(bank.air_temperature()).map(round1);
        obs.relative_humidity = mean(bank.relative_humidity()).map(round1);
        obs.station_pressure = mean(bank.station_pressure()).map(round1);

        if !bank.rainfall().is_empty() {
            obs.rainfall = Some(round1(bank.rainfall().iter().sum()));
        }
        if !bank.sunshine().is_empty() {
            let visible = bank.sunshine().iter().filter(|sun| **sun).count();
            obs.sunshine_duration = Some(u32::try_from(visible).unwrap_or(u32::MAX));
        }

        if time >= start_time + Duration::seconds(WINDOW_SECONDS) {
            obs.wind_speed = wind.speed;
            obs.wind_direction = wind.direction;
            obs.wind_gust = wind.gust;
        }

        if let (Some(t), Some(h)) = (obs.air_temperature, obs.relative_humidity) {
            obs.dew_point = finite(dew_point(t, h)).map(round1);
        }
        if let (Some(p), Some(t)) = (obs.station_pressure, obs.air_temperature) {
            obs.msl_pressure = finite(msl_pressure(p, t, self.elevation_m)).map(round1);
        }

        Ok(obs)
    }
}

/// Dew point in °C from air temperature (°C) and relative humidity (%).
pub fn dew_point(temperature: f64, humidity: f64) -> f64 {
    // ---
    let ea = (8.082 - temperature / 556.0) * temperature;
    let e = 0.4343 * (humidity / 100.0).ln() + ea / (256.1 + temperature);
    let sr = ((8.0813 - e).powi(2) - 1.842 * e).sqrt();
    278.04 * (8.0813 - e - sr)
}

/// Mean-sea-level pressure from station pressure (hPa), temperature (°C)
/// and station elevation (m).
pub fn msl_pressure(pressure: f64, temperature: f64, elevation_m: f64) -> f64 {
    // ---
    let x = 0.0065 * elevation_m / (temperature + 0.0065 * elevation_m + 273.15);
    pressure * (1.0 - x).powf(-5.257)
}

/// True if `time` is the start of its local day in `tz`: 00:00 local, or the
/// first valid local time when a DST transition skips midnight.
pub fn is_local_midnight(time: DateTime<Utc>, tz: Tz) -> bool {
    // ---
    let today = time.with_timezone(&tz).date_naive();
    local_midnight(today, tz).is_ok_and(|start| start == time)
}

/// Local dates whose daily statistic must be recomputed after logging the
/// observation at `time`.
///
/// The current local day is always included. At the start of a local day the
/// previous day comes first, because that observation closes it (see
/// [`local_day_bounds`]).
pub fn daily_statistic_dates(time: DateTime<Utc>, tz: Tz) -> Vec<NaiveDate> {
    // ---
    let today = time.with_timezone(&tz).date_naive();
    let mut dates = Vec::with_capacity(2);
    if is_local_midnight(time, tz) {
        if let Some(yesterday) = today.pred_opt() {
            dates.push(yesterday);
        }
    }
    dates.push(today);
    dates
}

/// UTC bounds `(start, end]` of the local day `date` in `tz`.
///
/// A local midnight skipped by a DST transition falls forward to the first
/// valid local time of that day.
pub fn local_day_bounds(
    date: NaiveDate,
    tz: Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
    // ---
    let next = date
        .succ_opt()
        .ok_or_else(|| format!("no day after {date}"))?;
    Ok((local_midnight(date, tz)?, local_midnight(next, tz)?))
}

fn local_midnight(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>, String> {
    // ---
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    (0..=2)
        .map(|h| midnight + Duration::hours(h))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("no valid local start of day for {date} in {tz}"))
}

fn mean(values: &[f64]) -> Option<f64> {
    // ---
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
