//! Turning meeting windows into timestamped lighting actions.
//!
//! Each action says which scene should come on (or that the lights go off)
//! at an absolute local time. Mapping scenes to whatever the bridge calls
//! them is the caller's job.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::policy::SchedulePolicy;
use crate::timeline::MeetingWindow;

/// The lighting state an action switches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneAction {
    /// More meetings coming up later today
    MeetingLater,
    /// A meeting starts within the lead window
    MeetingSoon,
    /// A meeting is running
    MeetingNow,
    /// Done for the day, wind down
    Chill,
    /// Lights out
    LightsOff,
}

impl SceneAction {
    pub fn label(&self) -> &'static str {
        match self {
            SceneAction::MeetingLater => "meeting-later",
            SceneAction::MeetingSoon => "meeting-soon",
            SceneAction::MeetingNow => "meeting-now",
            SceneAction::Chill => "chill",
            SceneAction::LightsOff => "lights-off",
        }
    }
}

/// One scheduled lighting change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightingAction {
    /// Schedule name: window id plus a suffix identifying the phase
    pub name: String,
    /// When the change happens, local time
    pub at: NaiveDateTime,
    pub scene: SceneAction,
}

/// Expand the day's meeting windows into the lighting actions to schedule.
///
/// Actions come out in chronological window order; within one window the
/// order is fixed: soon, now, then the after-meeting change.
pub fn plan_actions(
    windows: &BTreeMap<String, MeetingWindow>,
    now: NaiveDateTime,
    policy: &SchedulePolicy,
) -> Vec<LightingAction> {
    let mut actions = Vec::new();
    let mut first = true;

    for (key, window) in windows {
        // Show "meetings later" right away if the first one is still a
        // while out
        if first {
            if now < window.start - Duration::minutes(policy.lead_minutes) {
                actions.push(LightingAction {
                    name: format!("{key}_first"),
                    at: now,
                    scene: SceneAction::MeetingLater,
                });
            }
            first = false;
        }

        if window.gap_before_minutes >= policy.lead_minutes {
            actions.push(LightingAction {
                name: format!("{key}_soon"),
                at: window.start - Duration::minutes(policy.lead_minutes),
                scene: SceneAction::MeetingSoon,
            });
        }

        actions.push(LightingAction {
            name: format!("{key}_on"),
            at: window.start,
            scene: SceneAction::MeetingNow,
        });

        match window.gap_after_minutes {
            // Last meeting of the day: wind down, then lights out
            None => {
                actions.push(LightingAction {
                    name: format!("{key}_last"),
                    at: window.end + Duration::minutes(policy.linger_minutes),
                    scene: SceneAction::Chill,
                });
                actions.push(LightingAction {
                    name: format!("{key}_off"),
                    at: now.date().and_time(policy.lights_off_time),
                    scene: SceneAction::LightsOff,
                });
            }
            Some(after) if after >= 1 => {
                actions.push(LightingAction {
                    name: format!("{key}_more"),
                    at: window.end + Duration::minutes(policy.linger_minutes),
                    scene: SceneAction::MeetingLater,
                });
            }
            // Back-to-back with the next meeting: no scene change between
            Some(_) => {}
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Attendee, CalendarEvent, EventTime, ResponseStatus};
    use crate::policy::FilterRules;
    use crate::timeline::build_timeline;
    use chrono::NaiveDate;

    const USER: &str = "me@example.com";

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 20)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn rules() -> FilterRules {
        FilterRules {
            user_account: USER.to_string(),
            blocked_creators: vec![],
            keyword_exceptions: vec!["Interview".to_string()],
        }
    }

    fn meeting(id: &str, start: NaiveDateTime, end: NaiveDateTime) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            summary: "Weekly sync".to_string(),
            creator: "colleague@example.com".to_string(),
            attendees: vec![
                Attendee {
                    email: USER.to_string(),
                    response_status: ResponseStatus::Accepted,
                },
                Attendee {
                    email: "colleague@example.com".to_string(),
                    response_status: ResponseStatus::Accepted,
                },
            ],
            video_link: Some("https://meet.example.com/abc".to_string()),
            start: EventTime::DateTime(start),
            end: EventTime::DateTime(end),
        }
    }

    fn plan(events: &[CalendarEvent], now: NaiveDateTime) -> Vec<LightingAction> {
        let policy = SchedulePolicy::default();
        let windows = build_timeline(events, now, &rules(), &policy).unwrap();
        plan_actions(&windows, now, &policy)
    }

    #[test]
    fn single_meeting_full_day_sequence() {
        // 09:00-09:50 rounds to 10:00; last of day
        let actions = plan(&[meeting("e1", dt(9, 0), dt(9, 50))], dt(8, 0));

        let scenes: Vec<_> = actions.iter().map(|a| a.scene).collect();
        assert_eq!(
            scenes,
            vec![
                SceneAction::MeetingLater,
                SceneAction::MeetingSoon,
                SceneAction::MeetingNow,
                SceneAction::Chill,
                SceneAction::LightsOff,
            ]
        );
        assert_eq!(actions[0].at, dt(8, 0));
        assert_eq!(actions[1].at, dt(8, 50));
        assert_eq!(actions[2].at, dt(9, 0));
        assert_eq!(actions[3].at, dt(10, 3));
        assert_eq!(actions[4].at, dt(22, 0));
    }

    #[test]
    fn action_names_carry_window_id_and_suffix() {
        let actions = plan(&[meeting("e1", dt(9, 0), dt(9, 50))], dt(8, 0));

        assert!(actions[0].name.ends_with("_first"));
        assert!(actions[1].name.ends_with("_soon"));
        assert!(actions[2].name.ends_with("_on"));
        assert!(actions[3].name.ends_with("_last"));
        assert!(actions[4].name.ends_with("_off"));
        assert!(actions[2].name.starts_with("2025-03-20T09:00:00e1"));
    }

    #[test]
    fn no_later_scene_when_first_meeting_is_imminent() {
        let actions = plan(&[meeting("e1", dt(8, 5), dt(9, 0))], dt(8, 0));

        assert!(actions.iter().all(|a| a.scene != SceneAction::MeetingLater));
        // gap_before is 5, below the 10 minute lead, so no "soon" either
        assert!(actions.iter().all(|a| a.scene != SceneAction::MeetingSoon));
    }

    #[test]
    fn back_to_back_meetings_emit_no_transition_between() {
        let actions = plan(
            &[
                meeting("a", dt(9, 0), dt(9, 30)),
                meeting("b", dt(9, 30), dt(10, 0)),
            ],
            dt(8, 55),
        );

        let scenes: Vec<_> = actions.iter().map(|a| a.scene).collect();
        // No MeetingLater/MeetingSoon between the two "now" actions
        assert_eq!(
            scenes,
            vec![
                SceneAction::MeetingNow,
                SceneAction::MeetingNow,
                SceneAction::Chill,
                SceneAction::LightsOff,
            ]
        );
    }

    #[test]
    fn gap_between_meetings_gets_later_and_soon() {
        let actions = plan(
            &[
                meeting("a", dt(9, 0), dt(10, 0)),
                meeting("b", dt(11, 0), dt(12, 0)),
            ],
            dt(8, 55),
        );

        let scenes: Vec<_> = actions.iter().map(|a| a.scene).collect();
        assert_eq!(
            scenes,
            vec![
                SceneAction::MeetingNow,
                SceneAction::MeetingLater, // 10:03, more meetings today
                SceneAction::MeetingSoon,  // 10:50
                SceneAction::MeetingNow,   // 11:00
                SceneAction::Chill,
                SceneAction::LightsOff,
            ]
        );
        assert_eq!(actions[1].at, dt(10, 3));
        assert_eq!(actions[2].at, dt(10, 50));
    }

    #[test]
    fn in_progress_meeting_now_fires_at_clamped_start() {
        let now = dt(9, 20);
        let actions = plan(&[meeting("e1", dt(9, 0), dt(9, 50))], now);

        let now_action = actions
            .iter()
            .find(|a| a.scene == SceneAction::MeetingNow)
            .unwrap();
        assert_eq!(now_action.at, now);
    }

    #[test]
    fn filtered_events_produce_no_actions() {
        let mut event = meeting("e1", dt(9, 0), dt(9, 50));
        event.attendees.truncate(1); // single attendee, no keyword

        assert!(plan(&[event], dt(8, 0)).is_empty());
    }

    #[test]
    fn lights_off_honors_configured_time() {
        let policy = SchedulePolicy {
            lights_off_time: chrono::NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            ..SchedulePolicy::default()
        };
        let windows = build_timeline(
            &[meeting("e1", dt(9, 0), dt(9, 50))],
            dt(8, 0),
            &rules(),
            &policy,
        )
        .unwrap();
        let actions = plan_actions(&windows, dt(8, 0), &policy);

        let off = actions
            .iter()
            .find(|a| a.scene == SceneAction::LightsOff)
            .unwrap();
        assert_eq!(off.at, dt(23, 0));
    }
}
