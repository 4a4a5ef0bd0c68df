//! Observation records produced by the station core.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---

/// One minute's aggregated weather record, keyed by its minute-aligned UTC time.
///
/// Every field is optional: it is present only if the corresponding sensor is
/// enabled and produced at least one valid sample during the minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    // ---
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dew_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_gust: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rainfall: Option<f64>,
    /// Seconds during the minute with the sun flagged visible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunshine_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msl_pressure: Option<f64>,
}

impl Observation {
    // ---
    /// An observation with no fields populated.
    pub fn empty(time: DateTime<Utc>) -> Self {
        // ---
        Self {
            time,
            air_temperature: None,
            relative_humidity: None,
            dew_point: None,
            wind_speed: None,
            wind_direction: None,
            wind_gust: None,
            rainfall: None,
            sunshine_duration: None,
            station_pressure: None,
            msl_pressure: None,
        }
    }

    /// True if at least one wind field is populated.
    pub fn has_wind(&self) -> bool {
        self.wind_speed.is_some() || self.wind_direction.is_some() || self.wind_gust.is_some()
    }
}

/// Aggregate over all observations within one local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatistic {
    // ---
    pub date: NaiveDate,
    pub time_zone: String,
    pub observation_count: i64,
    pub air_temperature_avg: Option<f64>,
    pub air_temperature_min: Option<f64>,
    pub air_temperature_max: Option<f64>,
    pub relative_humidity_avg: Option<f64>,
    pub dew_point_avg: Option<f64>,
    pub wind_speed_avg: Option<f64>,
    pub wind_gust_max: Option<f64>,
    pub rainfall_total: Option<f64>,
    pub sunshine_duration_total: Option<i64>,
    pub msl_pressure_avg: Option<f64>,
}

impl DailyStatistic {
    // ---
    /// A statistic for a day with no observations.
    pub fn empty(date: NaiveDate, time_zone: impl Into<String>) -> Self {
        // ---
        Self {
            date,
            time_zone: time_zone.into(),
            observation_count: 0,
            air_temperature_avg: None,
            air_temperature_min: None,
            air_temperature_max: None,
            relative_humidity_avg: None,
            dew_point_avg: None,
            wind_speed_avg: None,
            wind_gust_max: None,
            rainfall_total: None,
            sunshine_duration_total: None,
            msl_pressure_avg: None,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_absent_fields_are_not_serialized() {
        // ---
        let mut obs = Observation::empty(Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap());
        obs.air_temperature = Some(21.4);

        let value = serde_json::to_value(&obs).unwrap();
        let fields = value.as_object().unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields["air_temperature"], 21.4);
        assert!(!fields.contains_key("dew_point"));
    }

    #[test]
    fn test_has_wind() {
        // ---
        let mut obs = Observation::empty(Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap());
        assert!(!obs.has_wind());

        obs.wind_gust = Some(0.0);
        assert!(obs.has_wind());
    }
}
