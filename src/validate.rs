use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::Category;

/// Raw text fields as submitted by the event creation/edit forms. Kept as
/// strings so required/format checks can distinguish blank from malformed
/// input before anything is parsed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventForm {
    pub title: String,
    pub description: String,
    pub date: String,
    pub from_time: String,
    pub to_time: String,
    pub location: String,
    pub max_attendees: String,
    pub creator_name: String,
    pub category: String,
}

impl Default for EventForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            date: String::new(),
            from_time: String::new(),
            to_time: String::new(),
            location: String::new(),
            max_attendees: String::new(),
            creator_name: String::new(),
            category: "tabling".to_string(),
        }
    }
}

/// Typed event fields produced from a form that passed validation.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    pub creator_name: String,
    pub date: NaiveDate,
    pub from_time: String,
    pub to_time: String,
    pub category: Category,
    pub max_attendees: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Empty input means unlimited capacity, not zero. Anything present must be
/// a positive integer.
pub fn parse_max_attendees(raw: &str) -> Result<Option<i64>, ()> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(()),
    }
}

/// True when the form's date parses and lies before `today` (local midnight
/// comparison). Creation hard-blocks on this; edits require an explicit
/// override instead.
pub fn date_in_past(form: &EventForm, today: NaiveDate) -> bool {
    parse_date(&form.date).is_some_and(|d| d < today)
}

/// Field-level validation shared by the create and edit forms. Returns a
/// field -> message map; an empty map means the form is acceptable.
pub fn validate(form: &EventForm, today: NaiveDate, mode: FormMode) -> HashMap<&'static str, String> {
    let mut errors = HashMap::new();

    if form.title.trim().is_empty() {
        errors.insert("title", "Event title is required".to_string());
    }
    if form.creator_name.trim().is_empty() {
        errors.insert("creatorName", "Your name is required".to_string());
    }
    if form.date.trim().is_empty() {
        errors.insert("date", "Event date is required".to_string());
    } else if parse_date(&form.date).is_none() {
        errors.insert("date", "Event date must be a valid date".to_string());
    }
    if form.from_time.trim().is_empty() {
        errors.insert("fromTime", "Start time is required".to_string());
    }
    if form.to_time.trim().is_empty() {
        errors.insert("toTime", "End time is required".to_string());
    }
    if form.location.trim().is_empty() {
        errors.insert("location", "Location is required".to_string());
    }
    if form.description.trim().is_empty() {
        errors.insert("description", "Description is required".to_string());
    }

    // Zero-padded HH:MM makes plain string comparison sufficient.
    if !form.from_time.is_empty() && !form.to_time.is_empty() && form.from_time >= form.to_time {
        errors.insert("toTime", "End time must be after start time".to_string());
    }

    if mode == FormMode::Create && date_in_past(form, today) {
        errors.insert("date", "Event date cannot be in the past".to_string());
    }

    if Category::parse(form.category.trim()).is_none() {
        errors.insert("category", "Unknown event category".to_string());
    }

    if parse_max_attendees(&form.max_attendees).is_err() {
        errors.insert("maxAttendees", "Max attendees must be a positive number".to_string());
    }

    errors
}

impl EventForm {
    /// Builds the typed event. Only meaningful after `validate` returned an
    /// empty map; a form that fails to parse here yields `None`.
    pub fn to_new_event(&self) -> Option<NewEvent> {
        Some(NewEvent {
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            creator_name: self.creator_name.clone(),
            date: parse_date(&self.date)?,
            from_time: self.from_time.clone(),
            to_time: self.to_time.clone(),
            category: Category::parse(self.category.trim())?,
            max_attendees: parse_max_attendees(&self.max_attendees).ok()?,
        })
    }
}
