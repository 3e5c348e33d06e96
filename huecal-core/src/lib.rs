//! Core types and logic for the huecal ecosystem.
//!
//! This crate contains the meeting-window timeline builder: it takes
//! calendar events for the current day, filters them down to qualifying
//! meetings, rounds and clamps their boundaries, computes the gaps between
//! them and turns the result into a list of timestamped lighting actions.
//!
//! Everything in here is pure and synchronous. Fetching events from a
//! calendar provider and talking to the lighting bridge are the caller's
//! responsibility.

pub mod actions;
pub mod error;
pub mod event;
pub mod policy;
pub mod timeline;

// Re-export the main types at crate root for convenience
pub use actions::{plan_actions, LightingAction, SceneAction};
pub use error::{TimelineError, TimelineResult};
pub use event::{Attendee, CalendarEvent, EventTime, ResponseStatus};
pub use policy::{FilterRules, InProgressClamp, SchedulePolicy};
pub use timeline::{build_timeline, MeetingWindow};
