//! Tick-synchronous sampling pipeline.
//!
//! The [`Pipeline`] consumes one [`Tick`] per second. It stays `Idle` until the
//! first tick on a minute boundary, then samples every enabled sensor into the
//! active bank on each tick. On every later minute boundary it swaps banks and
//! queues the finished minute for the [`Reporter`], a single long-lived worker
//! that owns the ten-minute [`WindWindow`], builds the observation and hands
//! it to persistence. The tick path never waits on the worker: the report
//! queue is bounded and a full queue drops that minute.

use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::buffer::{Bank, BankReturn, Channel, Sample, SampleBuffer, TimedValue};
use crate::clock::Tick;
use crate::error::{ReportError, SensorError};
use crate::indicator::{Activity, StatusIndicator};
use crate::models::Observation;
use crate::persistence::Persistence;
use crate::report::{daily_statistic_dates, ReportBuilder};
use crate::sensors::SensorSet;
use crate::status::StationStatus;
use crate::wind::{normalize_degrees, WindWindow};

// ---

const EVENT_CAPACITY: usize = 16;

/// Immutable station parameters supplied at construction.
#[derive(Debug, Clone, Copy)]
pub struct StationSettings {
    pub elevation_m: f64,
    pub time_zone: Tz,
    /// Minutes that may wait for the reporting worker before one is dropped.
    pub report_queue_depth: usize,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            elevation_m: 0.0,
            time_zone: Tz::UTC,
            report_queue_depth: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Sampling { start_time: DateTime<Utc> },
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Waiting for the first minute boundary.
    Idle,
    /// First minute boundary seen; sampling starts with the next tick.
    Started,
    /// Sensors sampled.
    Sampled,
    /// Sensors sampled and the finished minute queued for reporting.
    ReportQueued,
    /// Sensors sampled but the finished minute could not be queued.
    ReportDropped,
    /// Tick not after the previous one; ignored.
    Duplicate,
}

/// Outcome of one minute's report, published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    Logged { time: DateTime<Utc> },
    Failed { time: DateTime<Utc>, error: String },
}

/// One finished minute travelling from the tick path to the reporter.
#[derive(Debug)]
pub struct ReportJob {
    pub time: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub bank: Bank,
}

/// Accepts a sample only if the previous successful sample on the channel
/// was taken exactly one second earlier.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContinuityFilter {
    last_success: Option<DateTime<Utc>>,
}

impl ContinuityFilter {
    // ---
    /// Record a successful sample at `time` and report whether to keep it.
    pub fn admit(&mut self, time: DateTime<Utc>) -> bool {
        // ---
        let continuous = self
            .last_success
            .is_some_and(|prev| (time - prev).num_seconds() == 1);
        self.last_success = Some(time);
        continuous
    }
}

pub struct Pipeline {
    sensors: SensorSet,
    buffer: SampleBuffer,
    state: PipelineState,
    last_tick: Option<DateTime<Utc>>,
    wind_continuity: ContinuityFilter,
    rain_continuity: ContinuityFilter,
    reports: mpsc::Sender<ReportJob>,
    events: broadcast::Sender<ReportEvent>,
    indicator: Arc<dyn StatusIndicator>,
    status: Arc<StationStatus>,
}

impl Pipeline {
    // ---
    /// Build the pipeline and its reporting worker. The worker must be spawned
    /// (see [`Reporter::spawn`]) for observations to be logged.
    pub fn new(
        settings: StationSettings,
        sensors: SensorSet,
        persistence: Arc<dyn Persistence>,
        indicator: Arc<dyn StatusIndicator>,
        status: Arc<StationStatus>,
    ) -> (Self, Reporter) {
        // ---
        let (reports, jobs) = mpsc::channel(settings.report_queue_depth.max(1));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let buffer = SampleBuffer::new();

        info!(enabled = ?sensors.enabled(), "pipeline created");

        let reporter = Reporter {
            jobs,
            window: WindWindow::new(),
            builder: ReportBuilder::new(settings.elevation_m),
            time_zone: settings.time_zone,
            persistence,
            indicator: indicator.clone(),
            status: status.clone(),
            events: events.clone(),
            bank_return: buffer.bank_return(),
        };

        let pipeline = Self {
            sensors,
            buffer,
            state: PipelineState::Idle,
            last_tick: None,
            wind_continuity: ContinuityFilter::default(),
            rain_continuity: ContinuityFilter::default(),
            reports,
            events,
            indicator,
            status,
        };

        (pipeline, reporter)
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Receive report outcomes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ReportEvent> {
        self.events.subscribe()
    }

    /// Bank currently receiving samples.
    pub fn active_bank(&self) -> &Bank {
        self.buffer.active()
    }

    /// Process ticks until the tick source goes away.
    pub async fn run(mut self, mut ticks: mpsc::Receiver<Tick>) {
        // ---
        while let Some(tick) = ticks.recv().await {
            self.on_tick(tick);
        }
        info!("tick source closed, pipeline stopping");
    }

    /// Handle one tick. Never blocks and never fails.
    pub fn on_tick(&mut self, tick: Tick) -> TickOutcome {
        // ---
        let time = tick.time;

        if let Some(last) = self.last_tick {
            if time <= last {
                warn!(%time, %last, "tick not after previous tick, ignored");
                return TickOutcome::Duplicate;
            }
            let gap = (time - last).num_seconds();
            if gap > 1 {
                warn!(%time, missed = gap - 1, "missed ticks");
            }
        }
        self.last_tick = Some(time);
        self.status.record_tick();

        let start_time = match self.state {
            PipelineState::Idle => {
                if time.second() != 0 {
                    trace!(%time, "waiting for minute boundary");
                    return TickOutcome::Idle;
                }
                self.state = PipelineState::Sampling { start_time: time };
                self.status.record_start(time);
                info!(start_time = %time, "minute boundary reached, sampling started");
                return TickOutcome::Started;
            }
            PipelineState::Sampling { start_time } => start_time,
        };

        self.sample_sensors(time);

        if time.second() == 0 {
            return self.dispatch_report(time, start_time);
        }
        TickOutcome::Sampled
    }

    fn sample_sensors(&mut self, time: DateTime<Utc>) {
        // ---
        for channel in [
            Channel::AirTemperature,
            Channel::RelativeHumidity,
            Channel::StationPressure,
            Channel::WindSpeed,
            Channel::WindDirection,
            Channel::Rainfall,
        ] {
            self.sample_scalar(channel, time);
        }

        match self.sensors.sample_sunshine() {
            Some(Ok(visible)) => self.buffer.write(Sample::Sunshine(visible)),
            Some(Err(e)) => self.sensor_failed(Channel::Sunshine, &e),
            None => {}
        }
    }

    fn sample_scalar(&mut self, channel: Channel, time: DateTime<Utc>) {
        // ---
        let value = match self.sensors.sample_scalar(channel) {
            None => return,
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                self.sensor_failed(channel, &e);
                return;
            }
        };

        let sample = match channel {
            Channel::AirTemperature => Sample::AirTemperature(value),
            Channel::RelativeHumidity => Sample::RelativeHumidity(value),
            Channel::StationPressure => Sample::StationPressure(value),
            Channel::WindSpeed => {
                if value < 0.0 {
                    let e = SensorError::InvalidReading {
                        sensor: "wind_speed",
                        value,
                    };
                    self.sensor_failed(channel, &e);
                    return;
                }
                if !self.wind_continuity.admit(time) {
                    trace!(%time, "wind speed sample dropped, previous second missing");
                    return;
                }
                Sample::WindSpeed(TimedValue::new(time, value))
            }
            Channel::WindDirection => {
                Sample::WindDirection(TimedValue::new(time, normalize_degrees(value)))
            }
            Channel::Rainfall => {
                if !self.rain_continuity.admit(time) {
                    trace!(%time, "rainfall sample dropped, previous second missing");
                    return;
                }
                Sample::Rainfall(value)
            }
            Channel::Sunshine => return,
        };

        self.buffer.write(sample);
    }

    fn sensor_failed(&mut self, channel: Channel, e: &SensorError) {
        debug!(%channel, error = %e, "sensor sample failed");
        self.buffer.record_failure(channel);
    }

    fn dispatch_report(&mut self, time: DateTime<Utc>, start_time: DateTime<Utc>) -> TickOutcome {
        // ---
        let bank = self.buffer.swap();
        let job = ReportJob {
            time,
            start_time,
            bank,
        };

        match self.reports.try_send(job) {
            Ok(()) => TickOutcome::ReportQueued,
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.drop_report(job, "reporting worker is behind");
                TickOutcome::ReportDropped
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.drop_report(job, "reporting worker stopped");
                TickOutcome::ReportDropped
            }
        }
    }

    fn drop_report(&mut self, job: ReportJob, reason: &str) {
        // ---
        error!(time = %job.time, reason, "minute observation dropped");
        self.status.record_dropped(format!("{}: {}", job.time, reason));
        self.indicator.signal(Activity::Error);
        let _ = self.events.send(ReportEvent::Failed {
            time: job.time,
            error: reason.to_string(),
        });
        self.buffer.release(job.bank);
    }
}

/// Background worker turning finished minutes into stored observations.
pub struct Reporter {
    jobs: mpsc::Receiver<ReportJob>,
    window: WindWindow,
    builder: ReportBuilder,
    time_zone: Tz,
    persistence: Arc<dyn Persistence>,
    indicator: Arc<dyn StatusIndicator>,
    status: Arc<StationStatus>,
    events: broadcast::Sender<ReportEvent>,
    bank_return: BankReturn,
}

impl Reporter {
    // ---
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process queued minutes in order until the pipeline is dropped.
    pub async fn run(mut self) {
        // ---
        while let Some(job) = self.jobs.recv().await {
            self.process(job).await;
        }
        info!("reporting worker stopped");
    }

    async fn process(&mut self, job: ReportJob) {
        // ---
        let time = job.time;
        match self.report(job).await {
            Ok(obs) => {
                info!(
                    %time,
                    temperature = ?obs.air_temperature,
                    wind_speed = ?obs.wind_speed,
                    "observation logged"
                );
                self.status.record_logged(&obs);
                self.indicator.signal(Activity::Data);
                self.update_daily_statistics(time).await;
                let _ = self.events.send(ReportEvent::Logged { time });
            }
            Err(e) => {
                error!(%time, error = %e, "observation lost");
                self.status.record_failure(format!("{time}: {e}"));
                self.indicator.signal(Activity::Error);
                let _ = self.events.send(ReportEvent::Failed {
                    time,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn report(&mut self, job: ReportJob) -> Result<Observation, ReportError> {
        // ---
        let ReportJob {
            time,
            start_time,
            bank,
        } = job;

        self.window
            .buffer(time, bank.wind_speed(), bank.wind_direction());
        let wind = self.window.summarize();
        let built = self.builder.build(time, start_time, &bank, wind);

        if !bank.failures().is_empty() {
            warn!(
                %time,
                present = ?bank.channels_present(),
                failures = ?bank.failures(),
                "minute sampled in degraded mode"
            );
        }
        self.bank_return.release(bank);

        let obs = built?;
        self.persistence.write_observation(&obs).await?;
        Ok(obs)
    }

    async fn update_daily_statistics(&self, time: DateTime<Utc>) {
        // ---
        for date in daily_statistic_dates(time, self.time_zone) {
            let result = match self
                .persistence
                .recompute_daily_statistic(date, self.time_zone)
                .await
            {
                Ok(stat) => self.persistence.write_daily_statistic(&stat).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => debug!(%date, "daily statistic updated"),
                Err(e) => {
                    error!(%date, error = %e, "daily statistic update failed");
                    self.status.record_failure(format!("daily statistic {date}: {e}"));
                    self.indicator.signal(Activity::Error);
                }
            }
        }
    }
}
