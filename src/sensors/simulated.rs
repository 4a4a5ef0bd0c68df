//! Simulated sensors for bench runs without instrument hardware.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Sensor, SensorSet};
use crate::buffer::Channel;
use crate::error::SensorError;
use crate::wind::normalize_degrees;

// ---

/// A plausible mid-latitude station with a simulated sensor on each enabled channel.
pub fn bench_station(enabled: &BTreeSet<Channel>) -> SensorSet {
    // ---
    let mut set = SensorSet::default();
    for channel in enabled {
        match channel {
            Channel::AirTemperature => {
                set.air_temperature = Some(Box::new(RandomWalk::new(
                    "thermometer",
                    15.0,
                    0.05,
                    -40.0,
                    50.0,
                )))
            }
            Channel::RelativeHumidity => {
                set.relative_humidity =
                    Some(Box::new(RandomWalk::new("hygrometer", 60.0, 0.2, 1.0, 100.0)))
            }
            Channel::StationPressure => {
                set.station_pressure =
                    Some(Box::new(RandomWalk::new("barometer", 1000.0, 0.02, 850.0, 1085.0)))
            }
            Channel::WindSpeed => {
                set.wind_speed = Some(Box::new(
                    RandomWalk::new("anemometer", 3.0, 0.3, 0.0, 40.0).with_failure_rate(0.001),
                ))
            }
            Channel::WindDirection => set.wind_direction = Some(Box::new(Heading::new(220.0, 5.0))),
            Channel::Rainfall => set.rainfall = Some(Box::new(RainGauge::new(0.2, 0.002))),
            Channel::Sunshine => set.sunshine = Some(Box::new(SunshineRecorder::new(0.5))),
        }
    }
    set
}

/// A bounded random walk, e.g. temperature drifting around a base value.
pub struct RandomWalk {
    name: &'static str,
    value: f64,
    step: f64,
    min: f64,
    max: f64,
    failure_rate: f64,
    rng: StdRng,
}

impl RandomWalk {
    // ---
    pub fn new(name: &'static str, start: f64, step: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            value: start.clamp(min, max),
            step,
            min,
            max,
            failure_rate: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fail this fraction of calls to exercise degraded operation.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Sensor for RandomWalk {
    type Value = f64;

    fn name(&self) -> &'static str {
        self.name
    }

    fn sample(&mut self) -> Result<f64, SensorError> {
        // ---
        if self.failure_rate > 0.0 && self.rng.gen_bool(self.failure_rate) {
            return Err(SensorError::NotResponding { sensor: self.name });
        }
        let delta = self.rng.gen_range(-self.step..=self.step);
        self.value = (self.value + delta).clamp(self.min, self.max);
        Ok(self.value)
    }
}

/// Wind vane: a random walk on the compass, wrapping at 360°.
pub struct Heading {
    value: f64,
    step: f64,
    rng: StdRng,
}

impl Heading {
    pub fn new(start: f64, step: f64) -> Self {
        Self {
            value: normalize_degrees(start),
            step,
            rng: StdRng::from_entropy(),
        }
    }
}

impl Sensor for Heading {
    type Value = f64;

    fn name(&self) -> &'static str {
        "wind_vane"
    }

    fn sample(&mut self) -> Result<f64, SensorError> {
        let delta = self.rng.gen_range(-self.step..=self.step);
        self.value = normalize_degrees(self.value + delta);
        Ok(self.value)
    }
}

/// Tipping-bucket gauge: reports one bucket's worth of rain at random.
pub struct RainGauge {
    bucket_mm: f64,
    tip_probability: f64,
    rng: StdRng,
}

impl RainGauge {
    pub fn new(bucket_mm: f64, tip_probability: f64) -> Self {
        Self {
            bucket_mm,
            tip_probability: tip_probability.clamp(0.0, 1.0),
            rng: StdRng::from_entropy(),
        }
    }
}

impl Sensor for RainGauge {
    type Value = f64;

    fn name(&self) -> &'static str {
        "rain_gauge"
    }

    fn sample(&mut self) -> Result<f64, SensorError> {
        if self.rng.gen_bool(self.tip_probability) {
            Ok(self.bucket_mm)
        } else {
            Ok(0.0)
        }
    }
}

/// Sunshine recorder flagging the sun visible with a fixed probability.
pub struct SunshineRecorder {
    probability: f64,
    rng: StdRng,
}

impl SunshineRecorder {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
            rng: StdRng::from_entropy(),
        }
    }
}

impl Sensor for SunshineRecorder {
    type Value = bool;

    fn name(&self) -> &'static str {
        "sunshine_recorder"
    }

    fn sample(&mut self) -> Result<bool, SensorError> {
        Ok(self.rng.gen_bool(self.probability))
    }
}
