//! Status-indicator collaborator.
//!
//! Fire-and-forget activity signals correlated with reporting outcomes. The
//! station hardware drives an LED from these; the core never reads anything
//! back.

use std::fmt;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// An observation was logged.
    Data,
    /// A minute's observation was lost.
    Error,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Data => f.write_str("data"),
            Activity::Error => f.write_str("error"),
        }
    }
}

pub trait StatusIndicator: Send + Sync {
    fn signal(&self, activity: Activity);
}

/// Indicator that only logs, for stations without an LED.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingIndicator;

impl StatusIndicator for TracingIndicator {
    fn signal(&self, activity: Activity) {
        match activity {
            Activity::Data => tracing::debug!(%activity, "status indicator"),
            Activity::Error => tracing::warn!(%activity, "status indicator"),
        }
    }
}
