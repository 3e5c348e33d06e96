//! Provider-neutral calendar event types.
//!
//! Calendar adapters convert their API responses into these types, and the
//! timeline builder works exclusively with them. Timestamps are naive local
//! time: lighting schedules run on the bridge's wall clock, so the adapter
//! converts provider instants to local time before handing events over.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A calendar event as seen by the timeline builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    /// Email address of the event creator
    pub creator: String,
    /// Event attendees, including the user themselves
    pub attendees: Vec<Attendee>,
    /// Video call URL, if the event has one
    pub video_link: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

/// An event attendee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    pub response_status: ResponseStatus,
}

/// An attendee's reply to the invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Accepted,
    Declined,
    Tentative,
    NeedsAction,
}

impl ResponseStatus {
    /// Parse Google's response status strings.
    pub fn from_google(status: &str) -> Option<Self> {
        match status {
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "tentative" => Some(Self::Tentative),
            "needsAction" => Some(Self::NeedsAction),
            _ => None,
        }
    }
}

/// Start or end of an event: a local date-time, or a bare date for
/// all-day events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

impl EventTime {
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            EventTime::DateTime(dt) => Some(*dt),
            EventTime::Date(_) => None,
        }
    }

    /// Sort key: all-day events sort at midnight of their date.
    pub fn sort_key(&self) -> NaiveDateTime {
        match self {
            EventTime::DateTime(dt) => *dt,
            EventTime::Date(d) => d.and_hms_opt(0, 0, 0).unwrap(),
        }
    }
}
