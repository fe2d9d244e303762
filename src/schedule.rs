use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::models::Event;

/// Share of capacity above which an event is flagged as nearly full.
pub const NEARLY_FULL_RATIO: f64 = 0.8;

fn parse_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap_or(NaiveTime::MIN)
}

pub fn starts_at(event: &Event) -> NaiveDateTime {
    event.date.and_time(parse_time(&event.from_time))
}

pub fn ends_at(event: &Event) -> NaiveDateTime {
    event.date.and_time(parse_time(&event.to_time))
}

/// An event is past once the current instant reaches its end. The boundary
/// instant itself counts as past.
pub fn is_past(event: &Event, now: NaiveDateTime) -> bool {
    now >= ends_at(event)
}

/// Stable ascending sort by start instant. A blank or malformed start time
/// sorts the event at that day's midnight.
pub fn sort_chronologically(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by_key(starts_at);
    events
}

#[derive(Debug, Serialize)]
pub struct Categorized {
    pub upcoming: Vec<Event>,
    pub past: Vec<Event>,
}

/// Partitions events around `now`. Upcoming events come soonest-first;
/// past events come most-recently-held-first, so admins reviewing history
/// see the latest completed event at the top.
pub fn categorize(events: Vec<Event>, now: NaiveDateTime) -> Categorized {
    let (past, upcoming): (Vec<_>, Vec<_>) = events.into_iter().partition(|e| is_past(e, now));

    let mut past = sort_chronologically(past);
    past.reverse();

    Categorized {
        upcoming: sort_chronologically(upcoming),
        past,
    }
}

pub fn is_full(event: &Event) -> bool {
    event
        .max_attendees
        .is_some_and(|max| event.attendees.len() as i64 >= max)
}

/// Fill ratio against the capacity ceiling; `None` for unlimited events.
/// Display-only, never a control decision.
pub fn progress_ratio(event: &Event) -> Option<f64> {
    event
        .max_attendees
        .filter(|&max| max > 0)
        .map(|max| event.attendees.len() as f64 / max as f64)
}

pub fn is_nearly_full(event: &Event) -> bool {
    progress_ratio(event).is_some_and(|ratio| ratio > NEARLY_FULL_RATIO)
}
