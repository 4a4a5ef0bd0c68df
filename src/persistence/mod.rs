//! Persistence collaborator boundary.
//!
//! The reporting worker calls these synchronously (one after another) and
//! never retries; durability beyond a single call belongs to the store.

mod postgres;
mod schema;

pub use postgres::PgStore;
pub use schema::create_schema;

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::error::PersistenceError;
use crate::models::{DailyStatistic, Observation};

// ---

#[async_trait]
pub trait Persistence: Send + Sync {
    /// Store one minute's observation.
    async fn write_observation(&self, observation: &Observation) -> Result<(), PersistenceError>;

    /// Aggregate all stored observations of the local day `date` in `tz`.
    async fn recompute_daily_statistic(
        &self,
        date: NaiveDate,
        tz: Tz,
    ) -> Result<DailyStatistic, PersistenceError>;

    /// Store (or replace) a daily statistic.
    async fn write_daily_statistic(&self, statistic: &DailyStatistic) -> Result<(), PersistenceError>;
}
