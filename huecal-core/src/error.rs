//! Error types for timeline construction.

use thiserror::Error;

/// Errors that can occur while building the meeting timeline.
///
/// Any of these aborts the whole run: a partial schedule must never be
/// published to the bridge.
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Event '{id}' has a date-only start or end; all-day events cannot be rounded")]
    AllDayEvent { id: String },

    #[error("Event '{id}' ends at or before it starts after rounding")]
    EmptyWindow { id: String },
}

/// Result type alias for timeline operations.
pub type TimelineResult<T> = Result<T, TimelineError>;
