//! Double-buffered per-minute sample store.
//!
//! The tick thread owns the active [`Bank`] and writes into it every second.
//! Once per minute [`SampleBuffer::swap`] moves the active bank out by value and
//! installs an empty one, so the reporting task takes ownership of the whole
//! minute and the tick thread can never touch it again. When the reporting
//! task is done it hands the bank back through a [`BankReturn`], which clears
//! it before it becomes eligible for reuse. A writer therefore never observes
//! a bank mid-clear.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ---

/// A sensor channel sampled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    AirTemperature,
    RelativeHumidity,
    StationPressure,
    WindSpeed,
    WindDirection,
    Rainfall,
    Sunshine,
}

impl Channel {
    // ---
    pub const ALL: [Channel; 7] = [
        Channel::AirTemperature,
        Channel::RelativeHumidity,
        Channel::StationPressure,
        Channel::WindSpeed,
        Channel::WindDirection,
        Channel::Rainfall,
        Channel::Sunshine,
    ];

    /// Short configuration name of the channel.
    pub fn name(self) -> &'static str {
        // ---
        match self {
            Channel::AirTemperature => "temperature",
            Channel::RelativeHumidity => "humidity",
            Channel::StationPressure => "pressure",
            Channel::WindSpeed => "wind_speed",
            Channel::WindDirection => "wind_direction",
            Channel::Rainfall => "rainfall",
            Channel::Sunshine => "sunshine",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        Channel::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown sensor channel '{}'", s.trim()))
    }
}

/// A reading tagged with the UTC second it was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedValue {
    pub time: DateTime<Utc>,
    pub value: f64,
}

impl TimedValue {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self { time, value }
    }
}

/// An instantaneous, immutable sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    AirTemperature(f64),
    RelativeHumidity(f64),
    StationPressure(f64),
    WindSpeed(TimedValue),
    WindDirection(TimedValue),
    /// Rain accumulated since the previous second, in millimetres.
    Rainfall(f64),
    Sunshine(bool),
}

impl Sample {
    pub fn channel(&self) -> Channel {
        // ---
        match self {
            Sample::AirTemperature(_) => Channel::AirTemperature,
            Sample::RelativeHumidity(_) => Channel::RelativeHumidity,
            Sample::StationPressure(_) => Channel::StationPressure,
            Sample::WindSpeed(_) => Channel::WindSpeed,
            Sample::WindDirection(_) => Channel::WindDirection,
            Sample::Rainfall(_) => Channel::Rainfall,
            Sample::Sunshine(_) => Channel::Sunshine,
        }
    }
}

/// One half of the double buffer: every channel's samples for one minute.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Bank {
    // ---
    air_temperature: Vec<f64>,
    relative_humidity: Vec<f64>,
    station_pressure: Vec<f64>,
    wind_speed: Vec<TimedValue>,
    wind_direction: Vec<TimedValue>,
    rainfall: Vec<f64>,
    sunshine: Vec<bool>,
    failures: BTreeMap<Channel, u32>,
}

impl Bank {
    // ---
    pub fn push(&mut self, sample: Sample) {
        // ---
        match sample {
            Sample::AirTemperature(v) => self.air_temperature.push(v),
            Sample::RelativeHumidity(v) => self.relative_humidity.push(v),
            Sample::StationPressure(v) => self.station_pressure.push(v),
            Sample::WindSpeed(v) => self.wind_speed.push(v),
            Sample::WindDirection(v) => self.wind_direction.push(v),
            Sample::Rainfall(v) => self.rainfall.push(v),
            Sample::Sunshine(v) => self.sunshine.push(v),
        }
    }

    /// Count a failed sampling attempt for `channel`.
    pub fn record_failure(&mut self, channel: Channel) {
        *self.failures.entry(channel).or_insert(0) += 1;
    }

    pub fn air_temperature(&self) -> &[f64] {
        &self.air_temperature
    }

    pub fn relative_humidity(&self) -> &[f64] {
        &self.relative_humidity
    }

    pub fn station_pressure(&self) -> &[f64] {
        &self.station_pressure
    }

    pub fn wind_speed(&self) -> &[TimedValue] {
        &self.wind_speed
    }

    pub fn wind_direction(&self) -> &[TimedValue] {
        &self.wind_direction
    }

    pub fn rainfall(&self) -> &[f64] {
        &self.rainfall
    }

    pub fn sunshine(&self) -> &[bool] {
        &self.sunshine
    }

    /// Failed sampling attempts per channel during this minute.
    pub fn failures(&self) -> &BTreeMap<Channel, u32> {
        &self.failures
    }

    /// Number of samples held for `channel`.
    pub fn count(&self, channel: Channel) -> usize {
        // ---
        match channel {
            Channel::AirTemperature => self.air_temperature.len(),
            Channel::RelativeHumidity => self.relative_humidity.len(),
            Channel::StationPressure => self.station_pressure.len(),
            Channel::WindSpeed => self.wind_speed.len(),
            Channel::WindDirection => self.wind_direction.len(),
            Channel::Rainfall => self.rainfall.len(),
            Channel::Sunshine => self.sunshine.len(),
        }
    }

    /// Channels with at least one accepted sample.
    pub fn channels_present(&self) -> BTreeSet<Channel> {
        // ---
        Channel::ALL
            .into_iter()
            .filter(|c| self.count(*c) > 0)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels_present().is_empty() && self.failures.is_empty()
    }

    /// Empty every channel, keeping allocated capacity.
    pub fn clear(&mut self) {
        // ---
        self.air_temperature.clear();
        self.relative_humidity.clear();
        self.station_pressure.clear();
        self.wind_speed.clear();
        self.wind_direction.clear();
        self.rainfall.clear();
        self.sunshine.clear();
        self.failures.clear();
    }
}

/// Handle used by the reporting side to give a finished bank back.
#[derive(Debug, Clone)]
pub struct BankReturn {
    tx: mpsc::UnboundedSender<Bank>,
}

impl BankReturn {
    // ---
    /// Clear `bank` and make it eligible to become active again.
    pub fn release(&self, mut bank: Bank) {
        // ---
        bank.clear();
        if self.tx.send(bank).is_err() {
            tracing::trace!("sample buffer gone, dropping returned bank");
        }
    }
}

/// Double-buffered sample store. Only the tick thread holds this.
#[derive(Debug)]
pub struct SampleBuffer {
    active: Bank,
    spare: Vec<Bank>,
    returned: mpsc::UnboundedReceiver<Bank>,
    return_tx: mpsc::UnboundedSender<Bank>,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBuffer {
    // ---
    pub fn new() -> Self {
        // ---
        let (return_tx, returned) = mpsc::unbounded_channel();
        Self {
            active: Bank::default(),
            spare: vec![Bank::default()],
            returned,
            return_tx,
        }
    }

    /// Handle for returning banks from another task.
    pub fn bank_return(&self) -> BankReturn {
        BankReturn {
            tx: self.return_tx.clone(),
        }
    }

    /// Append to the active bank. Never blocks.
    pub fn write(&mut self, sample: Sample) {
        self.active.push(sample);
    }

    /// Count a failed sampling attempt in the active bank.
    pub fn record_failure(&mut self, channel: Channel) {
        self.active.record_failure(channel);
    }

    /// The bank currently receiving writes.
    pub fn active(&self) -> &Bank {
        &self.active
    }

    /// Install an empty bank as active and hand the previous one to the caller.
    ///
    /// If the previous inactive bank has not been returned yet, a fresh bank
    /// is allocated instead of waiting for it.
    pub fn swap(&mut self) -> Bank {
        // ---
        while let Ok(bank) = self.returned.try_recv() {
            self.spare.push(bank);
        }
        let next = self.spare.pop().unwrap_or_else(|| {
            tracing::debug!("no cleared bank available, allocating a new one");
            Bank::default()
        });
        std::mem::replace(&mut self.active, next)
    }

    /// Clear a bank the tick thread still owns (a report that was never dispatched).
    pub fn release(&mut self, mut bank: Bank) {
        bank.clear();
        self.spare.push(bank);
    }
}
