//! Sensor collaborator boundary.
//!
//! Drivers for the individual instruments live outside the core. The pipeline
//! only needs each one to answer [`Sensor::sample`] quickly; any error is
//! treated the same way (the channel's sample is missing for that second).

pub mod simulated;

use std::collections::BTreeSet;

use crate::buffer::Channel;
use crate::error::SensorError;

// ---

/// A sensor that produces one reading per call.
pub trait Sensor: Send {
    /// The type of reading this sensor produces.
    type Value;

    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Take one reading. Must return well within a tick.
    fn sample(&mut self) -> Result<Self::Value, SensorError>;
}

pub type ScalarSensor = Box<dyn Sensor<Value = f64>>;
pub type FlagSensor = Box<dyn Sensor<Value = bool>>;

/// The station's enabled sensors, one optional collaborator per channel.
#[derive(Default)]
pub struct SensorSet {
    // ---
    pub air_temperature: Option<ScalarSensor>,
    pub relative_humidity: Option<ScalarSensor>,
    pub station_pressure: Option<ScalarSensor>,
    pub wind_speed: Option<ScalarSensor>,
    pub wind_direction: Option<ScalarSensor>,
    /// Rain since the previous second, in millimetres.
    pub rainfall: Option<ScalarSensor>,
    pub sunshine: Option<FlagSensor>,
}

impl SensorSet {
    // ---
    /// Channels with a sensor attached.
    pub fn enabled(&self) -> BTreeSet<Channel> {
        // ---
        let mut enabled = BTreeSet::new();
        let slots = [
            (Channel::AirTemperature, self.air_temperature.is_some()),
            (Channel::RelativeHumidity, self.relative_humidity.is_some()),
            (Channel::StationPressure, self.station_pressure.is_some()),
            (Channel::WindSpeed, self.wind_speed.is_some()),
            (Channel::WindDirection, self.wind_direction.is_some()),
            (Channel::Rainfall, self.rainfall.is_some()),
            (Channel::Sunshine, self.sunshine.is_some()),
        ];
        for (channel, present) in slots {
            if present {
                enabled.insert(channel);
            }
        }
        enabled
    }

    /// Sample a scalar channel, or `None` if it has no sensor attached.
    ///
    /// Non-finite readings are rejected here so they never reach averaging.
    pub fn sample_scalar(&mut self, channel: Channel) -> Option<Result<f64, SensorError>> {
        // ---
        let sensor = match channel {
            Channel::AirTemperature => self.air_temperature.as_mut(),
            Channel::RelativeHumidity => self.relative_humidity.as_mut(),
            Channel::StationPressure => self.station_pressure.as_mut(),
            Channel::WindSpeed => self.wind_speed.as_mut(),
            Channel::WindDirection => self.wind_direction.as_mut(),
            Channel::Rainfall => self.rainfall.as_mut(),
            Channel::Sunshine => None,
        }?;

        Some(sensor.sample().and_then(|value| {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(SensorError::InvalidReading {
                    sensor: sensor.name(),
                    value,
                })
            }
        }))
    }

    /// Sample the sunshine flag, or `None` if no sensor is attached.
    pub fn sample_sunshine(&mut self) -> Option<Result<bool, SensorError>> {
        self.sunshine.as_mut().map(|sensor| sensor.sample())
    }
}

impl std::fmt::Debug for SensorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSet")
            .field("enabled", &self.enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    struct Fixed(f64);

    impl Sensor for Fixed {
        type Value = f64;

        fn name(&self) -> &'static str {
            "fixed"
        }

        fn sample(&mut self) -> Result<f64, SensorError> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_enabled_channels() {
        // ---
        let set = SensorSet {
            air_temperature: Some(Box::new(Fixed(20.0))),
            wind_speed: Some(Box::new(Fixed(1.0))),
            ..Default::default()
        };

        assert_eq!(
            set.enabled().into_iter().collect::<Vec<_>>(),
            vec![Channel::AirTemperature, Channel::WindSpeed]
        );
    }

    #[test]
    fn test_non_finite_reading_is_an_error() {
        // ---
        let mut set = SensorSet {
            station_pressure: Some(Box::new(Fixed(f64::NAN))),
            air_temperature: Some(Box::new(Fixed(7.5))),
            ..Default::default()
        };

        assert!(matches!(
            set.sample_scalar(Channel::StationPressure),
            Some(Err(SensorError::InvalidReading { .. }))
        ));
        assert_eq!(set.sample_scalar(Channel::AirTemperature), Some(Ok(7.5)));
        assert_eq!(set.sample_scalar(Channel::RelativeHumidity), None);
        assert_eq!(set.sample_sunshine(), None);
    }
}
