//! Error taxonomy for the station core.
//!
//! Each failure class maps to one propagation policy:
//! - [`ClockFault`] is fatal; the caller aborts startup.
//! - [`SensorError`] is swallowed per tick; the channel's data is simply missing.
//! - [`ReportError`] loses one minute's observation; the pipeline keeps running.
//! - [`PersistenceError`] surfaces through [`ReportError::Persistence`].

use thiserror::Error;

/// The real-time clock could not be driven reliably.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockFault {
    #[error("RTC bus error: {0}")]
    Bus(String),

    #[error("RTC returned an invalid time: {0}")]
    InvalidTime(String),

    #[error("RTC alarm interrupt line closed")]
    LineClosed,
}

/// A single sampling attempt failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("{sensor}: read failed: {details}")]
    ReadFailed {
        sensor: &'static str,
        details: String,
    },

    #[error("{sensor}: not responding")]
    NotResponding { sensor: &'static str },

    #[error("{sensor}: invalid reading {value}")]
    InvalidReading { sensor: &'static str, value: f64 },
}

/// Building or persisting one minute's observation failed.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to build observation: {0}")]
    Build(String),

    #[error("Failed to persist observation: {0}")]
    Persistence(#[from] PersistenceError),
}

/// The persistence collaborator rejected a call.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Time zone error: {0}")]
    TimeZone(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
