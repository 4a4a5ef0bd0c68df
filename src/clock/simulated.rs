//! Software stand-ins for the RTC and its alarm line.
//!
//! Used for bench runs on hosts without the clock hardware. The simulated RTC
//! counts whole seconds from a seed time on a monotonic clock, so it does not
//! jump when the host wall clock is adjusted.

use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::time::{interval_at, Interval, MissedTickBehavior};

use super::{AlarmLine, RtcPeripheral};
use crate::error::ClockFault;

// ---

#[derive(Debug)]
pub struct SimulatedRtc {
    seed: DateTime<Utc>,
    started: Instant,
    armed: bool,
}

impl SimulatedRtc {
    pub fn new(seed: DateTime<Utc>) -> Self {
        Self {
            seed,
            started: Instant::now(),
            armed: false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl RtcPeripheral for SimulatedRtc {
    fn init(&mut self) -> Result<(), ClockFault> {
        Ok(())
    }

    fn arm_every_second(&mut self) -> Result<(), ClockFault> {
        self.armed = true;
        Ok(())
    }

    fn clear_alarm_flag(&mut self) -> Result<(), ClockFault> {
        Ok(())
    }

    fn now(&mut self) -> Result<DateTime<Utc>, ClockFault> {
        // ---
        let elapsed = i64::try_from(self.started.elapsed().as_secs())
            .map_err(|e| ClockFault::InvalidTime(e.to_string()))?;
        Ok(self.seed + Duration::seconds(elapsed))
    }
}

/// A once-per-second "interrupt" backed by a tokio interval.
pub struct IntervalAlarmLine {
    interval: Interval,
}

impl IntervalAlarmLine {
    /// First edge fires one period from now.
    pub fn new(period: StdDuration) -> Self {
        // ---
        let mut interval = interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        Self { interval }
    }
}

#[async_trait]
impl AlarmLine for IntervalAlarmLine {
    async fn falling_edge(&mut self) -> Result<(), ClockFault> {
        self.interval.tick().await;
        Ok(())
    }
}
