use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::broadcast;

use weatherstation::clock::Tick;
use weatherstation::indicator::{Activity, StatusIndicator};
use weatherstation::persistence::Persistence;
use weatherstation::sensors::{Sensor, SensorSet};
use weatherstation::status::StationStatus;
use weatherstation::{
    DailyStatistic, Observation, PersistenceError, Pipeline, ReportEvent, SensorError,
    StationSettings, TickOutcome,
};

// ---

/// In-memory store recording everything it is asked to do.
#[derive(Default)]
struct RecordingStore {
    observations: Mutex<Vec<Observation>>,
    recomputed: Mutex<Vec<NaiveDate>>,
    down: AtomicBool,
}

impl RecordingStore {
    fn observations(&self) -> Vec<Observation> {
        self.observations.lock().unwrap().clone()
    }

    fn recomputed(&self) -> Vec<NaiveDate> {
        self.recomputed.lock().unwrap().clone()
    }

    fn check_up(&self) -> Result<(), PersistenceError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Persistence for RecordingStore {
    async fn write_observation(&self, observation: &Observation) -> Result<(), PersistenceError> {
        self.check_up()?;
        self.observations.lock().unwrap().push(observation.clone());
        Ok(())
    }

    async fn recompute_daily_statistic(
        &self,
        date: NaiveDate,
        tz: Tz,
    ) -> Result<DailyStatistic, PersistenceError> {
        self.check_up()?;
        self.recomputed.lock().unwrap().push(date);
        Ok(DailyStatistic::empty(date, tz.name()))
    }

    async fn write_daily_statistic(&self, _: &DailyStatistic) -> Result<(), PersistenceError> {
        self.check_up()
    }
}

#[derive(Default)]
struct RecordingIndicator {
    signals: Mutex<Vec<Activity>>,
}

impl StatusIndicator for RecordingIndicator {
    fn signal(&self, activity: Activity) {
        self.signals.lock().unwrap().push(activity);
    }
}

struct Constant(f64);

impl Sensor for Constant {
    type Value = f64;

    fn name(&self) -> &'static str {
        "constant"
    }

    fn sample(&mut self) -> Result<f64, SensorError> {
        Ok(self.0)
    }
}

struct Broken;

impl Sensor for Broken {
    type Value = f64;

    fn name(&self) -> &'static str {
        "broken"
    }

    fn sample(&mut self) -> Result<f64, SensorError> {
        Err(SensorError::NotResponding { sensor: "broken" })
    }
}

struct Sunny;

impl Sensor for Sunny {
    type Value = bool;

    fn name(&self) -> &'static str {
        "sunny"
    }

    fn sample(&mut self) -> Result<bool, SensorError> {
        Ok(true)
    }
}

struct Station {
    pipeline: Pipeline,
    events: broadcast::Receiver<ReportEvent>,
    store: Arc<RecordingStore>,
    indicator: Arc<RecordingIndicator>,
    status: Arc<StationStatus>,
}

fn station(settings: StationSettings, sensors: SensorSet) -> Station {
    // ---
    let store = Arc::new(RecordingStore::default());
    let indicator = Arc::new(RecordingIndicator::default());
    let status = Arc::new(StationStatus::new());
    let (pipeline, reporter) = Pipeline::new(
        settings,
        sensors,
        store.clone(),
        indicator.clone(),
        status.clone(),
    );
    reporter.spawn();
    let events = pipeline.subscribe();
    Station {
        pipeline,
        events,
        store,
        indicator,
        status,
    }
}

impl Station {
    /// Feed ticks `from..=to`, waiting for each queued minute to be reported.
    async fn run(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<ReportEvent>> {
        // ---
        let mut events = Vec::new();
        let mut time = from;
        while time <= to {
            if self.pipeline.on_tick(Tick::new(time)) == TickOutcome::ReportQueued {
                let event = tokio::time::timeout(StdDuration::from_secs(5), self.events.recv())
                    .await
                    .map_err(|_| anyhow!("no report for {time}"))??;
                events.push(event);
            }
            time += Duration::seconds(1);
        }
        Ok(events)
    }
}

fn weather_sensors() -> SensorSet {
    SensorSet {
        air_temperature: Some(Box::new(Constant(20.0))),
        relative_humidity: Some(Box::new(Constant(50.0))),
        station_pressure: Some(Box::new(Constant(950.0))),
        wind_speed: Some(Box::new(Constant(2.0))),
        wind_direction: Some(Box::new(Constant(180.0))),
        rainfall: Some(Box::new(Constant(0.1))),
        sunshine: Some(Box::new(Sunny)),
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn ten_minutes_of_steady_wind() -> Result<()> {
    // ---
    let settings = StationSettings {
        elevation_m: 500.0,
        ..Default::default()
    };
    let mut station = station(settings, weather_sensors());

    let events = station
        .run(t0() - Duration::seconds(20), t0() + Duration::seconds(600))
        .await?;

    let expected: Vec<ReportEvent> = (1..=10)
        .map(|m| ReportEvent::Logged {
            time: t0() + Duration::minutes(m),
        })
        .collect();
    assert_eq!(events, expected);

    let observations = station.store.observations();
    assert_eq!(observations.len(), 10);

    for obs in &observations[..9] {
        assert!(!obs.has_wind(), "wind reported early at {}", obs.time);
    }

    let first = &observations[0];
    assert_eq!(first.air_temperature, Some(20.0));
    assert_eq!(first.relative_humidity, Some(50.0));
    assert_eq!(first.dew_point, Some(9.3));
    assert_eq!(first.station_pressure, Some(950.0));
    assert_eq!(first.msl_pressure, Some(1006.7));
    assert_eq!(first.sunshine_duration, Some(60));
    // First rain sample of the run has no predecessor
    assert_eq!(first.rainfall, Some(5.9));
    assert_eq!(observations[1].rainfall, Some(6.0));

    let tenth = &observations[9];
    assert_eq!(tenth.time, t0() + Duration::minutes(10));
    assert_eq!(tenth.wind_speed, Some(2.0));
    assert_eq!(tenth.wind_direction, Some(180));
    assert_eq!(tenth.wind_gust, Some(2.0));

    let snapshot = station.status.snapshot();
    assert_eq!(snapshot.state, "sampling");
    assert_eq!(snapshot.started_at, Some(t0()));
    assert_eq!(snapshot.ticks, 621);
    assert_eq!(snapshot.observations_logged, 10);
    assert_eq!(snapshot.report_failures, 0);

    let signals = station.indicator.signals.lock().unwrap().clone();
    assert_eq!(signals, vec![Activity::Data; 10]);
    Ok(())
}

#[tokio::test]
async fn degraded_sensor_leaves_only_its_fields_absent() -> Result<()> {
    // ---
    let sensors = SensorSet {
        air_temperature: Some(Box::new(Broken)),
        relative_humidity: Some(Box::new(Constant(50.0))),
        station_pressure: Some(Box::new(Constant(950.0))),
        ..Default::default()
    };
    let mut station = station(StationSettings::default(), sensors);

    station.run(t0(), t0() + Duration::seconds(60)).await?;

    let observations = station.store.observations();
    assert_eq!(observations.len(), 1);
    let obs = &observations[0];
    assert_eq!(obs.air_temperature, None);
    assert_eq!(obs.dew_point, None);
    assert_eq!(obs.msl_pressure, None);
    assert_eq!(obs.relative_humidity, Some(50.0));
    assert_eq!(obs.station_pressure, Some(950.0));
    assert_eq!(obs.rainfall, None);
    assert_eq!(obs.sunshine_duration, None);
    Ok(())
}

#[tokio::test]
async fn persistence_failure_does_not_stop_sampling() -> Result<()> {
    // ---
    let mut station = station(StationSettings::default(), weather_sensors());

    station.store.down.store(true, Ordering::SeqCst);
    let failed = station.run(t0(), t0() + Duration::seconds(60)).await?;

    station.store.down.store(false, Ordering::SeqCst);
    let logged = station
        .run(t0() + Duration::seconds(61), t0() + Duration::seconds(120))
        .await?;

    assert!(matches!(
        failed.as_slice(),
        [ReportEvent::Failed { time, error }]
            if *time == t0() + Duration::minutes(1) && error.contains("connection refused")
    ));
    assert_eq!(
        logged,
        vec![ReportEvent::Logged {
            time: t0() + Duration::minutes(2)
        }]
    );

    let observations = station.store.observations();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].air_temperature, Some(20.0));

    let snapshot = station.status.snapshot();
    assert_eq!(snapshot.report_failures, 1);
    assert_eq!(snapshot.observations_logged, 1);
    assert!(snapshot.last_error.is_some());

    let signals = station.indicator.signals.lock().unwrap().clone();
    assert_eq!(signals, vec![Activity::Error, Activity::Data]);
    Ok(())
}

#[tokio::test]
async fn local_midnight_recomputes_both_days() -> Result<()> {
    // ---
    let settings = StationSettings {
        time_zone: chrono_tz::Europe::Berlin,
        ..Default::default()
    };
    let mut station = station(settings, weather_sensors());

    // 22:00 UTC is 00:00 CEST
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 21, 59, 0).unwrap();
    station.run(start, start + Duration::seconds(120)).await?;

    let june_1 = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let june_2 = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    assert_eq!(station.store.recomputed(), vec![june_1, june_2, june_2]);
    Ok(())
}
