use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tabling,
    Outreach,
    Training,
    Meeting,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Tabling => "tabling",
            Category::Outreach => "outreach",
            Category::Training => "training",
            Category::Meeting => "meeting",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        match s {
            "tabling" => Some(Category::Tabling),
            "outreach" => Some(Category::Outreach),
            "training" => Some(Category::Training),
            "meeting" => Some(Category::Meeting),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShiftPreference {
    FirstHalf,
    SecondHalf,
    #[default]
    Full,
}

impl ShiftPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            ShiftPreference::FirstHalf => "first-half",
            ShiftPreference::SecondHalf => "second-half",
            ShiftPreference::Full => "full",
        }
    }

    pub fn parse(s: &str) -> Option<ShiftPreference> {
        match s {
            "first-half" => Some(ShiftPreference::FirstHalf),
            "second-half" => Some(ShiftPreference::SecondHalf),
            "full" => Some(ShiftPreference::Full),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub shift_preference: ShiftPreference,
    pub signed_up_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostEventMetrics {
    pub volunteers_attended: i64,
    pub visitors_engaged: i64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub creator_name: String,
    pub date: NaiveDate,
    pub from_time: String,
    pub to_time: String,
    pub category: Category,
    pub max_attendees: Option<i64>,
    pub attendees: Vec<Attendee>,
    pub created_at: NaiveDateTime,
    pub post_event_metrics: Option<PostEventMetrics>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub message: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub public_id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub creator_name: String,
    pub date: NaiveDate,
    pub from_time: String,
    pub to_time: String,
    pub category: String,
    pub max_attendees: Option<i64>,
    pub metrics_volunteers: Option<i64>,
    pub metrics_visitors: Option<i64>,
    pub metrics_notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl EventRow {
    pub fn into_event(self, attendees: Vec<Attendee>) -> Event {
        let post_event_metrics = if self.metrics_volunteers.is_none()
            && self.metrics_visitors.is_none()
            && self.metrics_notes.is_none()
        {
            None
        } else {
            Some(PostEventMetrics {
                volunteers_attended: self.metrics_volunteers.unwrap_or(0),
                visitors_engaged: self.metrics_visitors.unwrap_or(0),
                notes: self.metrics_notes.unwrap_or_default(),
            })
        };

        Event {
            id: self.id,
            public_id: self.public_id,
            title: self.title,
            description: self.description,
            location: self.location,
            creator_name: self.creator_name,
            date: self.date,
            from_time: self.from_time,
            to_time: self.to_time,
            // Rows written before a category existed fall back to the default bucket.
            category: Category::parse(&self.category).unwrap_or(Category::Tabling),
            max_attendees: self.max_attendees,
            attendees,
            created_at: self.created_at,
            post_event_metrics,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct AttendeeRow {
    pub event_id: i64,
    pub name: String,
    pub email: String,
    pub shift_preference: String,
    pub signed_up_at: NaiveDateTime,
}

impl AttendeeRow {
    pub fn into_attendee(self) -> Attendee {
        Attendee {
            name: self.name,
            email: self.email,
            shift_preference: ShiftPreference::parse(&self.shift_preference)
                .unwrap_or(ShiftPreference::Full),
            signed_up_at: self.signed_up_at,
        }
    }
}
