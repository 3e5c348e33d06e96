//! The meeting-window timeline builder.
//!
//! Takes today's calendar events and produces an ordered map of
//! [`MeetingWindow`]s with rounded boundaries and the gap in minutes before
//! and after each one. The map is keyed by start-timestamp-then-event-id,
//! so iterating it always walks the day in chronological order.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{TimelineError, TimelineResult};
use crate::event::CalendarEvent;
use crate::policy::{FilterRules, SchedulePolicy};

/// A qualifying meeting, normalized and placed on today's timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingWindow {
    /// Start timestamp concatenated with the event id (also the map key)
    pub id: String,
    pub title: String,
    pub start: NaiveDateTime,
    /// End, rounded up to the next half-hour or full-hour boundary
    pub end: NaiveDateTime,
    pub duration_minutes: i64,
    /// Minutes of free time before this meeting; 0 when back-to-back,
    /// overlapping, or already started
    pub gap_before_minutes: i64,
    /// Minutes of free time after this meeting; `None` marks the last
    /// meeting of the day
    pub gap_after_minutes: Option<i64>,
}

/// Round an end time up to the next half-hour or full-hour boundary.
///
/// Minute 0 and 30 are already boundaries and stay untouched, which makes
/// the rounding idempotent.
pub fn round_end_up(end: NaiveDateTime) -> NaiveDateTime {
    let minute = end.minute() as i64;
    match minute {
        1..=29 => end + Duration::minutes(30 - minute),
        31..=59 => end + Duration::minutes(60 - minute),
        _ => end,
    }
}

/// Build the day's meeting windows from raw calendar events.
///
/// Events are filtered against `rules`, normalized (end rounded up, start
/// clamped for in-progress meetings per `policy`), restricted to windows
/// that end today and in the future, and finally annotated with the gap
/// before and after each one.
pub fn build_timeline(
    events: &[CalendarEvent],
    now: NaiveDateTime,
    rules: &FilterRules,
    policy: &SchedulePolicy,
) -> TimelineResult<BTreeMap<String, MeetingWindow>> {
    let mut windows: Vec<MeetingWindow> = Vec::new();

    for event in events {
        if !rules.qualifies(event) {
            continue;
        }

        let raw_start = event
            .start
            .as_datetime()
            .ok_or_else(|| TimelineError::AllDayEvent {
                id: event.id.clone(),
            })?;
        let raw_end = event
            .end
            .as_datetime()
            .ok_or_else(|| TimelineError::AllDayEvent {
                id: event.id.clone(),
            })?;

        let end = round_end_up(raw_end);

        // Meeting already running: pretend it starts now
        let start = if raw_start <= now && end > now {
            policy.in_progress_clamp.apply(now)
        } else {
            raw_start
        };

        // Only running or upcoming meetings on the current day matter
        if end.date() != now.date() || end <= now {
            continue;
        }

        if end <= start {
            return Err(TimelineError::EmptyWindow {
                id: event.id.clone(),
            });
        }

        let duration_minutes = (end - start).num_minutes();

        windows.push(MeetingWindow {
            id: format!("{}{}", start.format("%Y-%m-%dT%H:%M:%S"), event.id),
            title: event.summary.clone(),
            start,
            end,
            duration_minutes,
            gap_before_minutes: 0,
            gap_after_minutes: None,
        });
    }

    windows.sort_by(|a, b| (a.start, &a.id).cmp(&(b.start, &b.id)));
    compute_gaps(&mut windows, now);

    Ok(windows.into_iter().map(|w| (w.id.clone(), w)).collect())
}

/// Fill in `gap_before_minutes` and `gap_after_minutes` for windows sorted
/// by (start, id).
fn compute_gaps(windows: &mut [MeetingWindow], now: NaiveDateTime) {
    let n = windows.len();

    for i in 0..n {
        let mut gap_before = if i == 0 {
            if windows[0].start <= now {
                0
            } else {
                (windows[0].start - now).num_minutes()
            }
        } else {
            (windows[i].start - windows[i - 1].end).num_minutes().max(0)
        };

        // Overlap resolution: a window contained in another one has no gap
        // on the contained side, whatever the sequential arithmetic said.
        // Quadratic, but the day holds a handful of meetings at most.
        let mut gap_after_forced = false;
        for j in 0..n {
            if j == i {
                continue;
            }
            if windows[j].start < windows[i].start && windows[i].start < windows[j].end {
                gap_before = 0;
            }
            if windows[j].start < windows[i].end && windows[i].end < windows[j].end {
                gap_after_forced = true;
            }
        }

        windows[i].gap_before_minutes = gap_before;
        if gap_after_forced {
            windows[i].gap_after_minutes = Some(0);
        }

        // The gap between two adjacent meetings is the same value viewed
        // from either side, unless the overlap rule already pinned it.
        if i > 0 && windows[i - 1].gap_after_minutes.is_none() {
            windows[i - 1].gap_after_minutes = Some(gap_before);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Attendee, EventTime, ResponseStatus};
    use chrono::{NaiveDate, NaiveTime};

    const USER: &str = "me@example.com";

    fn rules() -> FilterRules {
        FilterRules {
            user_account: USER.to_string(),
            blocked_creators: vec!["noise@example.com".to_string()],
            keyword_exceptions: vec!["Interview".to_string()],
        }
    }

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 20)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn attendee(email: &str, status: ResponseStatus) -> Attendee {
        Attendee {
            email: email.to_string(),
            response_status: status,
        }
    }

    fn meeting(id: &str, start: NaiveDateTime, end: NaiveDateTime) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            summary: "Weekly sync".to_string(),
            creator: "colleague@example.com".to_string(),
            attendees: vec![
                attendee(USER, ResponseStatus::Accepted),
                attendee("colleague@example.com", ResponseStatus::Accepted),
            ],
            video_link: Some("https://meet.example.com/abc".to_string()),
            start: EventTime::DateTime(start),
            end: EventTime::DateTime(end),
        }
    }

    #[test]
    fn round_up_to_half_hour() {
        assert_eq!(round_end_up(dt(9, 1)), dt(9, 30));
        assert_eq!(round_end_up(dt(9, 29)), dt(9, 30));
    }

    #[test]
    fn round_up_to_full_hour() {
        assert_eq!(round_end_up(dt(9, 31)), dt(10, 0));
        assert_eq!(round_end_up(dt(9, 59)), dt(10, 0));
        assert_eq!(round_end_up(dt(9, 50)), dt(10, 0));
    }

    #[test]
    fn rounding_is_idempotent_on_boundaries() {
        assert_eq!(round_end_up(dt(9, 0)), dt(9, 0));
        assert_eq!(round_end_up(dt(9, 30)), dt(9, 30));
        assert_eq!(round_end_up(round_end_up(dt(9, 17))), dt(9, 30));
    }

    #[test]
    fn declined_event_is_filtered() {
        let mut event = meeting("e1", dt(9, 0), dt(9, 50));
        event.attendees[0].response_status = ResponseStatus::Declined;

        let windows =
            build_timeline(&[event], dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn event_without_video_link_is_filtered() {
        let mut event = meeting("e1", dt(9, 0), dt(9, 50));
        event.video_link = None;

        let windows =
            build_timeline(&[event], dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn blocked_creator_is_filtered() {
        let mut event = meeting("e1", dt(9, 0), dt(9, 50));
        event.creator = "noise@example.com".to_string();

        let windows =
            build_timeline(&[event], dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn single_attendee_is_filtered_without_keyword() {
        let mut event = meeting("e1", dt(9, 0), dt(9, 50));
        event.attendees.truncate(1);

        let windows =
            build_timeline(&[event], dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn single_attendee_with_keyword_qualifies() {
        let mut event = meeting("e1", dt(9, 0), dt(9, 50));
        event.attendees.truncate(1);
        event.summary = "Interview: backend engineer".to_string();

        let windows =
            build_timeline(&[event], dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn single_event_is_rounded_and_last_of_day() {
        let windows = build_timeline(
            &[meeting("e1", dt(9, 0), dt(9, 50))],
            dt(8, 0),
            &rules(),
            &SchedulePolicy::default(),
        )
        .unwrap();

        let w = windows.values().next().unwrap();
        assert_eq!(w.start, dt(9, 0));
        assert_eq!(w.end, dt(10, 0));
        assert_eq!(w.duration_minutes, 60);
        assert_eq!(w.gap_before_minutes, 60);
        assert_eq!(w.gap_after_minutes, None);
    }

    #[test]
    fn event_ending_yesterday_or_tomorrow_is_dropped() {
        let tomorrow = NaiveDate::from_ymd_opt(2025, 3, 21)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let events = vec![
            meeting("past", dt(6, 0), dt(7, 0)),
            meeting("next-day", tomorrow, tomorrow + Duration::hours(1)),
        ];

        let windows =
            build_timeline(&events, dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn in_progress_meeting_is_clamped_to_now() {
        let windows = build_timeline(
            &[meeting("e1", dt(9, 0), dt(10, 0))],
            dt(9, 20),
            &rules(),
            &SchedulePolicy::default(),
        )
        .unwrap();

        let w = windows.values().next().unwrap();
        assert_eq!(w.start, dt(9, 20));
        assert_eq!(w.duration_minutes, 40);
        assert_eq!(w.gap_before_minutes, 0);
    }

    #[test]
    fn in_progress_clamp_can_leave_a_minute_of_slack() {
        let policy = SchedulePolicy {
            in_progress_clamp: crate::policy::InProgressClamp::NowPlusOneMinute,
            ..SchedulePolicy::default()
        };
        let windows =
            build_timeline(&[meeting("e1", dt(9, 0), dt(10, 0))], dt(9, 20), &rules(), &policy)
                .unwrap();

        assert_eq!(windows.values().next().unwrap().start, dt(9, 21));
    }

    #[test]
    fn back_to_back_meetings_have_zero_gap_between() {
        let events = vec![
            meeting("a", dt(9, 0), dt(9, 30)),
            meeting("b", dt(9, 30), dt(10, 0)),
        ];

        let windows =
            build_timeline(&events, dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        let ws: Vec<_> = windows.values().collect();
        assert_eq!(ws[0].gap_after_minutes, Some(0));
        assert_eq!(ws[1].gap_before_minutes, 0);
        assert_eq!(ws[1].gap_after_minutes, None);
    }

    #[test]
    fn adjacent_gaps_agree_from_both_sides() {
        let events = vec![
            meeting("a", dt(9, 0), dt(10, 0)),
            meeting("b", dt(11, 0), dt(12, 0)),
        ];

        let windows =
            build_timeline(&events, dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        let ws: Vec<_> = windows.values().collect();
        assert_eq!(ws[0].gap_after_minutes, Some(60));
        assert_eq!(ws[1].gap_before_minutes, 60);
    }

    #[test]
    fn contained_start_forces_zero_gap_before() {
        // X spans 09:00-10:00 and W starts inside it at 09:30
        let events = vec![
            meeting("x", dt(9, 0), dt(10, 0)),
            meeting("w", dt(9, 30), dt(10, 30)),
        ];

        let windows =
            build_timeline(&events, dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        let w = windows.values().nth(1).unwrap();
        assert_eq!(w.gap_before_minutes, 0);
        // and X's end at 10:00 falls inside W's 09:30-10:30 span
        let x = windows.values().next().unwrap();
        assert_eq!(x.gap_after_minutes, Some(0));
    }

    #[test]
    fn gaps_are_never_negative() {
        let events = vec![
            meeting("a", dt(9, 0), dt(10, 15)), // rounds to 10:30
            meeting("b", dt(10, 20), dt(11, 0)),
        ];

        let windows =
            build_timeline(&events, dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        for w in windows.values() {
            assert!(w.gap_before_minutes >= 0);
            assert!(w.gap_after_minutes.map_or(true, |g| g >= 0));
        }
    }

    #[test]
    fn windows_iterate_in_start_order() {
        // Input deliberately out of order
        let events = vec![
            meeting("late", dt(14, 0), dt(15, 0)),
            meeting("early", dt(9, 0), dt(10, 0)),
        ];

        let windows =
            build_timeline(&events, dt(8, 0), &rules(), &SchedulePolicy::default()).unwrap();
        let starts: Vec<_> = windows.values().map(|w| w.start).collect();
        assert_eq!(starts, vec![dt(9, 0), dt(14, 0)]);
    }

    #[test]
    fn all_day_event_is_an_error() {
        let mut event = meeting("e1", dt(9, 0), dt(10, 0));
        event.start = EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap());

        let err = build_timeline(&[event], dt(8, 0), &rules(), &SchedulePolicy::default())
            .unwrap_err();
        assert!(matches!(err, TimelineError::AllDayEvent { .. }));
    }

    #[test]
    fn seconds_are_truncated_in_durations() {
        let start = dt(9, 0) + Duration::seconds(30);
        let windows = build_timeline(
            &[meeting("e1", start, dt(9, 30))],
            dt(8, 0),
            &rules(),
            &SchedulePolicy::default(),
        )
        .unwrap();

        // 29.5 minutes truncates to 29
        assert_eq!(windows.values().next().unwrap().duration_minutes, 29);
    }

    #[test]
    fn default_lights_off_is_ten_pm() {
        let policy = SchedulePolicy::default();
        assert_eq!(policy.lights_off_time, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
    }
}
