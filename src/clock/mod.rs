//! Real-time-clock tick source.
//!
//! The RTC peripheral raises a once-per-second alarm on a GPIO line. On every
//! falling edge the [`TickSource`] re-reads the peripheral's own time (never
//! the host clock), clears the alarm flag so the next tick can fire, and
//! pushes a [`Tick`] into a bounded channel consumed by the pipeline.

pub mod ds3231;
pub mod simulated;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ClockFault;

// ---

/// One-second timing pulse carrying the RTC's UTC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub time: DateTime<Utc>,
}

impl Tick {
    /// A tick at `time`, truncated to the whole second.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: time.with_nanosecond(0).unwrap_or(time),
        }
    }
}

/// Register-level contract of the RTC peripheral.
pub trait RtcPeripheral: Send {
    /// Verify communication and clear any pending alarm-triggered flags.
    fn init(&mut self) -> Result<(), ClockFault>;

    /// Arm the once-per-second alarm.
    fn arm_every_second(&mut self) -> Result<(), ClockFault>;

    /// Clear the alarm-triggered flag so the next alarm can fire.
    fn clear_alarm_flag(&mut self) -> Result<(), ClockFault>;

    /// Current time as kept by the peripheral.
    fn now(&mut self) -> Result<DateTime<Utc>, ClockFault>;
}

/// The interrupt line the RTC alarm output is wired to.
#[async_trait]
pub trait AlarmLine: Send {
    /// Resolve on the next falling edge.
    async fn falling_edge(&mut self) -> Result<(), ClockFault>;
}

/// Opened RTC plus its interrupt line.
pub struct TickSource<R, L> {
    rtc: R,
    line: L,
}

impl<R, L> TickSource<R, L>
where
    R: RtcPeripheral + 'static,
    L: AlarmLine + 'static,
{
    // ---
    /// Initialize the peripheral. A failure here is fatal for the station.
    pub fn open(mut rtc: R, line: L) -> Result<Self, ClockFault> {
        // ---
        rtc.init()?;
        rtc.clear_alarm_flag()?;
        let now = rtc.now()?;
        tracing::info!(rtc_time = %now, "RTC opened");
        Ok(Self { rtc, line })
    }

    /// Arm the alarm and start emitting ticks into `ticks`.
    ///
    /// The returned task ends when the receiver is dropped, or with a
    /// [`ClockFault`] if the interrupt line fails.
    pub fn start(
        mut self,
        ticks: mpsc::Sender<Tick>,
    ) -> Result<JoinHandle<Result<(), ClockFault>>, ClockFault> {
        // ---
        self.rtc.arm_every_second()?;
        tracing::info!("RTC alarm armed, ticking every second");
        Ok(tokio::spawn(async move { self.run(ticks).await }))
    }

    async fn run(&mut self, ticks: mpsc::Sender<Tick>) -> Result<(), ClockFault> {
        // ---
        loop {
            self.line.falling_edge().await?;

            let time = match self.rtc.now() {
                Ok(time) => Some(time),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read RTC time, tick lost");
                    None
                }
            };

            if let Err(e) = self.rtc.clear_alarm_flag() {
                tracing::warn!(error = %e, "failed to clear RTC alarm flag");
            }

            if let Some(time) = time {
                if ticks.send(Tick::new(time)).await.is_err() {
                    tracing::info!("tick consumer gone, stopping tick source");
                    return Ok(());
                }
            }
        }
    }
}
