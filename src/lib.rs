//! Core of an automatic weather station.
//!
//! A real-time clock drives a once-per-second tick. Every tick samples the
//! station's sensors into a double-buffered minute bank; every minute the
//! finished bank is reduced to one [`Observation`] (averages, dew point,
//! mean-sea-level pressure, ten-minute wind) and handed to persistence,
//! together with the affected daily statistics.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): each
//! module exposes a small surface and the binary only wires them together.

pub mod buffer;
pub mod clock;
pub mod config;
pub mod error;
pub mod indicator;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod report;
pub mod routes;
pub mod sensors;
pub mod status;
pub mod wind;

pub use config::Config;
pub use error::{ClockFault, PersistenceError, ReportError, SensorError};
pub use models::{DailyStatistic, Observation};
pub use pipeline::{Pipeline, ReportEvent, Reporter, StationSettings, TickOutcome};
