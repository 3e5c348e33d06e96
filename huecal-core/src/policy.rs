//! Configuration passed into the timeline builder.
//!
//! Everything that used to be tweakable only by editing constants lives
//! here as an explicit value the caller constructs once and passes in.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::event::{CalendarEvent, ResponseStatus};

/// Which events count as meetings worth lighting for.
#[derive(Debug, Clone)]
pub struct FilterRules {
    /// The calendar owner's email address
    pub user_account: String,
    /// Events created by these addresses never qualify
    pub blocked_creators: Vec<String>,
    /// Title keywords that let a single-attendee event qualify anyway
    /// (e.g. an interview where the other side is not on the invite)
    pub keyword_exceptions: Vec<String>,
}

impl FilterRules {
    /// Whether an event qualifies as a meeting-window candidate.
    ///
    /// All four conditions must hold: the user accepted, there is a video
    /// link, the creator is not blocked, and there is either more than one
    /// attendee or a keyword exception in the title.
    pub fn qualifies(&self, event: &CalendarEvent) -> bool {
        let accepted = event.attendees.iter().any(|a| {
            a.email == self.user_account && a.response_status == ResponseStatus::Accepted
        });
        if !accepted {
            return false;
        }

        if event.video_link.as_deref().unwrap_or("").is_empty() {
            return false;
        }

        if self.blocked_creators.iter().any(|b| *b == event.creator) {
            return false;
        }

        event.attendees.len() > 1
            || self
                .keyword_exceptions
                .iter()
                .any(|kw| event.summary.contains(kw.as_str()))
    }
}

/// What to do with a meeting that is already running when we build the
/// timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InProgressClamp {
    /// Clamp the start to the current time
    #[default]
    Now,
    /// Clamp the start to one minute from now, leaving a beat before the
    /// meeting scene kicks in
    NowPlusOneMinute,
}

impl InProgressClamp {
    pub fn apply(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            InProgressClamp::Now => now,
            InProgressClamp::NowPlusOneMinute => now + Duration::minutes(1),
        }
    }
}

/// Timing knobs for the emitted lighting schedule.
#[derive(Debug, Clone)]
pub struct SchedulePolicy {
    pub in_progress_clamp: InProgressClamp,
    /// When to switch the lights off after the last meeting of the day
    pub lights_off_time: NaiveTime,
    /// Minutes a meeting is allowed to run over before the scene changes
    pub linger_minutes: i64,
    /// How far ahead of a meeting the "soon" scene comes on
    pub lead_minutes: i64,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        SchedulePolicy {
            in_progress_clamp: InProgressClamp::Now,
            lights_off_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            linger_minutes: 3,
            lead_minutes: 10,
        }
    }
}
