use std::collections::HashMap;

use nanoid::nanoid;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::{Attendee, AttendeeRow, Event, EventRow, Notification, PostEventMetrics, ShiftPreference};
use crate::validate::NewEvent;

pub async fn init_schema(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            public_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            location TEXT NOT NULL,
            creator_name TEXT NOT NULL,
            date DATE NOT NULL,
            from_time TEXT NOT NULL,
            to_time TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'tabling',
            max_attendees INTEGER,
            metrics_volunteers INTEGER,
            metrics_visitors INTEGER,
            metrics_notes TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS attendees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            email TEXT NOT NULL COLLATE NOCASE,
            shift_preference TEXT NOT NULL DEFAULT 'full',
            signed_up_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (event_id) REFERENCES events (id) ON DELETE CASCADE,
            UNIQUE(event_id, email)
        );",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message TEXT NOT NULL,
            timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Full event list in store order: newest creation first, matching what the
/// subscription channel pushes. Attendee rosters are loaded in one pass and
/// grouped by event.
pub async fn get_all_events(pool: &SqlitePool) -> Result<Vec<Event>, AppError> {
    let rows: Vec<EventRow> =
        sqlx::query_as("SELECT * FROM events ORDER BY created_at DESC, id DESC")
            .fetch_all(pool)
            .await?;

    let attendee_rows: Vec<AttendeeRow> = sqlx::query_as(
        "SELECT event_id, name, email, shift_preference, signed_up_at
         FROM attendees ORDER BY event_id, id",
    )
    .fetch_all(pool)
    .await?;

    let mut rosters: HashMap<i64, Vec<Attendee>> = HashMap::new();
    for row in attendee_rows {
        rosters
            .entry(row.event_id)
            .or_default()
            .push(row.into_attendee());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let attendees = rosters.remove(&row.id).unwrap_or_default();
            row.into_event(attendees)
        })
        .collect())
}

pub async fn get_event(pool: &SqlitePool, public_id: &str) -> Result<Event, AppError> {
    let row: EventRow = sqlx::query_as("SELECT * FROM events WHERE public_id = ?")
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No such event.".to_string()))?;

    let attendees = attendees_for(pool, row.id).await?;
    Ok(row.into_event(attendees))
}

async fn attendees_for(pool: &SqlitePool, event_id: i64) -> Result<Vec<Attendee>, AppError> {
    let rows: Vec<AttendeeRow> = sqlx::query_as(
        "SELECT event_id, name, email, shift_preference, signed_up_at
         FROM attendees WHERE event_id = ? ORDER BY id",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AttendeeRow::into_attendee).collect())
}

pub async fn create_event(pool: &SqlitePool, new_event: &NewEvent) -> Result<Event, AppError> {
    let public_id = nanoid!(10);
    let row: EventRow = sqlx::query_as(
        "INSERT INTO events (public_id, title, description, location, creator_name, date, from_time, to_time, category, max_attendees)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(public_id)
    .bind(&new_event.title)
    .bind(&new_event.description)
    .bind(&new_event.location)
    .bind(&new_event.creator_name)
    .bind(new_event.date)
    .bind(&new_event.from_time)
    .bind(&new_event.to_time)
    .bind(new_event.category.as_str())
    .bind(new_event.max_attendees)
    .fetch_one(pool)
    .await?;

    Ok(row.into_event(Vec::new()))
}

/// Replaces the editable fields wholesale. `public_id`, the roster, the
/// metrics and `created_at` are never touched here.
pub async fn update_event(
    pool: &SqlitePool,
    public_id: &str,
    new_event: &NewEvent,
) -> Result<Event, AppError> {
    let row: EventRow = sqlx::query_as(
        "UPDATE events
         SET title = ?, description = ?, location = ?, creator_name = ?, date = ?,
             from_time = ?, to_time = ?, category = ?, max_attendees = ?
         WHERE public_id = ? RETURNING *",
    )
    .bind(&new_event.title)
    .bind(&new_event.description)
    .bind(&new_event.location)
    .bind(&new_event.creator_name)
    .bind(new_event.date)
    .bind(&new_event.from_time)
    .bind(&new_event.to_time)
    .bind(new_event.category.as_str())
    .bind(new_event.max_attendees)
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("No such event.".to_string()))?;

    let attendees = attendees_for(pool, row.id).await?;
    Ok(row.into_event(attendees))
}

pub async fn delete_event(pool: &SqlitePool, public_id: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM events WHERE public_id = ?")
        .bind(public_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("No such event.".to_string()));
    }
    Ok(())
}

/// Appends one attendee inside a transaction that re-reads the current
/// roster: the capacity ceiling and the per-event email uniqueness are both
/// re-verified against committed state, so two near-simultaneous signups
/// cannot lose each other or breach `max_attendees`.
pub async fn add_attendee(
    pool: &SqlitePool,
    event_id: i64,
    name: &str,
    email: &str,
    shift_preference: ShiftPreference,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let (max_attendees,): (Option<i64>,) =
        sqlx::query_as("SELECT max_attendees FROM events WHERE id = ?")
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("No such event.".to_string()))?;

    if let Some(max) = max_attendees {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendees WHERE event_id = ?")
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await?;
        if count >= max {
            return Err(AppError::Conflict("This event is already full.".to_string()));
        }
    }

    // The email column is COLLATE NOCASE, so this lookup (and the UNIQUE
    // constraint behind it) is case-insensitive.
    let duplicate: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM attendees WHERE event_id = ? AND email = ?")
            .bind(event_id)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(
            "This email address is already registered for this event.".to_string(),
        ));
    }

    sqlx::query("INSERT INTO attendees (event_id, name, email, shift_preference) VALUES (?, ?, ?, ?)")
        .bind(event_id)
        .bind(name)
        .bind(email)
        .bind(shift_preference.as_str())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Removes the attendee at `index` (insertion order). The position is
/// resolved to a row id inside the transaction, so a concurrent signup
/// cannot shift which attendee is deleted mid-operation.
pub async fn remove_attendee(pool: &SqlitePool, event_id: i64, index: usize) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM attendees WHERE event_id = ? ORDER BY id")
        .bind(event_id)
        .fetch_all(&mut *tx)
        .await?;

    let Some((attendee_id,)) = ids.get(index) else {
        return Err(AppError::NotFound("No attendee at that position.".to_string()));
    };

    sqlx::query("DELETE FROM attendees WHERE id = ?")
        .bind(*attendee_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn save_metrics(
    pool: &SqlitePool,
    public_id: &str,
    metrics: &PostEventMetrics,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE events SET metrics_volunteers = ?, metrics_visitors = ?, metrics_notes = ?
         WHERE public_id = ?",
    )
    .bind(metrics.volunteers_attended)
    .bind(metrics.visitors_engaged)
    .bind(&metrics.notes)
    .bind(public_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("No such event.".to_string()));
    }
    Ok(())
}

pub async fn get_notifications(pool: &SqlitePool) -> Result<Vec<Notification>, AppError> {
    sqlx::query_as("SELECT * FROM notifications ORDER BY timestamp DESC, id DESC")
        .fetch_all(pool)
        .await
        .map_err(AppError::from)
}

pub async fn add_notification(pool: &SqlitePool, message: &str) -> Result<Notification, AppError> {
    sqlx::query_as("INSERT INTO notifications (message) VALUES (?) RETURNING *")
        .bind(message)
        .fetch_one(pool)
        .await
        .map_err(AppError::from)
}

pub async fn clear_notifications(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query("DELETE FROM notifications")
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::schedule;
    use crate::signup;
    use chrono::NaiveDate;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    // A single connection keeps every query on the same in-memory database.
    async fn test_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .expect("parse options")
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("open in-memory db");
        init_schema(&pool).await.expect("create schema");
        pool
    }

    fn pier39_event(max_attendees: Option<i64>) -> NewEvent {
        NewEvent {
            title: "Tabling at Pier 39".to_string(),
            description: "Shorebird outreach table".to_string(),
            location: "Pier 39".to_string(),
            creator_name: "Dana".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 20).expect("valid date"),
            from_time: "09:00".to_string(),
            to_time: "12:00".to_string(),
            category: Category::Tabling,
            max_attendees,
        }
    }

    #[tokio::test]
    async fn created_event_gets_a_public_id_and_an_empty_roster() {
        let pool = test_pool().await;
        let event = create_event(&pool, &pier39_event(None)).await.expect("create");

        assert_eq!(event.public_id.len(), 10);
        assert!(event.attendees.is_empty());
        assert_eq!(event.post_event_metrics, None);

        let fetched = get_event(&pool, &event.public_id).await.expect("fetch");
        assert_eq!(fetched.title, "Tabling at Pier 39");
    }

    #[tokio::test]
    async fn listing_puts_the_newest_event_first() {
        let pool = test_pool().await;
        let first = create_event(&pool, &pier39_event(None)).await.expect("create");
        let mut second_form = pier39_event(None);
        second_form.title = "Marsh cleanup".to_string();
        let second = create_event(&pool, &second_form).await.expect("create");

        let events = get_all_events(&pool).await.expect("list");
        assert_eq!(events[0].public_id, second.public_id);
        assert_eq!(events[1].public_id, first.public_id);
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let pool = test_pool().await;
        assert!(matches!(
            get_event(&pool, "missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_replaces_fields_but_keeps_identity_and_roster() {
        let pool = test_pool().await;
        let event = create_event(&pool, &pier39_event(None)).await.expect("create");
        add_attendee(&pool, event.id, "Alice", "alice@x.com", ShiftPreference::Full)
            .await
            .expect("signup");

        let mut edited = pier39_event(Some(5));
        edited.title = "Tabling at Fort Point".to_string();
        edited.location = "Fort Point".to_string();
        let updated = update_event(&pool, &event.public_id, &edited).await.expect("update");

        assert_eq!(updated.public_id, event.public_id);
        assert_eq!(updated.created_at, event.created_at);
        assert_eq!(updated.title, "Tabling at Fort Point");
        assert_eq!(updated.max_attendees, Some(5));
        assert_eq!(updated.attendees.len(), 1);
    }

    #[tokio::test]
    async fn deleting_an_event_drops_its_roster_too() {
        let pool = test_pool().await;
        let event = create_event(&pool, &pier39_event(None)).await.expect("create");
        add_attendee(&pool, event.id, "Alice", "alice@x.com", ShiftPreference::Full)
            .await
            .expect("signup");

        delete_event(&pool, &event.public_id).await.expect("delete");

        assert!(matches!(
            get_event(&pool, &event.public_id).await,
            Err(AppError::NotFound(_))
        ));
        let (orphans,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendees")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn attendees_keep_signup_order_and_defaults() {
        let pool = test_pool().await;
        let event = create_event(&pool, &pier39_event(None)).await.expect("create");

        add_attendee(&pool, event.id, "Alice", "alice@x.com", ShiftPreference::Full)
            .await
            .expect("signup");
        add_attendee(&pool, event.id, "Bob", "bob@x.com", ShiftPreference::FirstHalf)
            .await
            .expect("signup");

        let event = get_event(&pool, &event.public_id).await.expect("fetch");
        assert_eq!(event.attendees[0].name, "Alice");
        assert_eq!(event.attendees[0].shift_preference, ShiftPreference::Full);
        assert_eq!(event.attendees[1].name, "Bob");
        assert_eq!(event.attendees[1].shift_preference, ShiftPreference::FirstHalf);
    }

    #[tokio::test]
    async fn second_signup_with_the_same_email_is_rejected_any_casing() {
        let pool = test_pool().await;
        let event = create_event(&pool, &pier39_event(None)).await.expect("create");

        add_attendee(&pool, event.id, "Alice", "alice@x.com", ShiftPreference::Full)
            .await
            .expect("signup");
        let outcome = add_attendee(&pool, event.id, "Alice", "ALICE@x.com", ShiftPreference::Full).await;

        assert!(matches!(outcome, Err(AppError::Conflict(_))));
        let event = get_event(&pool, &event.public_id).await.expect("fetch");
        assert_eq!(event.attendees.len(), 1);
    }

    // The Pier 39 scenario: the pure precheck waves Carol through (it does
    // not look at capacity), and the store's transactional gate is what
    // actually turns her away.
    #[tokio::test]
    async fn capacity_gate_lives_in_the_store_not_the_precheck() {
        let pool = test_pool().await;
        let event = create_event(&pool, &pier39_event(Some(2))).await.expect("create");

        add_attendee(&pool, event.id, "Alice", "alice@x.com", ShiftPreference::Full)
            .await
            .expect("signup");
        add_attendee(&pool, event.id, "Bob", "bob@x.com", ShiftPreference::Full)
            .await
            .expect("signup");

        let event = get_event(&pool, &event.public_id).await.expect("fetch");
        assert!(schedule::is_full(&event));
        assert_eq!(signup::check_admission(&event, "Carol", "carol@x.com"), Ok(()));

        let outcome = add_attendee(&pool, event.id, "Carol", "carol@x.com", ShiftPreference::Full).await;
        assert!(matches!(outcome, Err(AppError::Conflict(_))));

        let event = get_event(&pool, &event.public_id).await.expect("fetch");
        assert_eq!(event.attendees.len(), 2);
    }

    #[tokio::test]
    async fn removing_the_first_attendee_keeps_the_rest_in_order() {
        let pool = test_pool().await;
        let event = create_event(&pool, &pier39_event(None)).await.expect("create");
        for (name, email) in [("Alice", "alice@x.com"), ("Bob", "bob@x.com"), ("Carol", "carol@x.com")] {
            add_attendee(&pool, event.id, name, email, ShiftPreference::Full)
                .await
                .expect("signup");
        }

        remove_attendee(&pool, event.id, 0).await.expect("remove");

        let event = get_event(&pool, &event.public_id).await.expect("fetch");
        let names: Vec<&str> = event.attendees.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Carol"]);
    }

    #[tokio::test]
    async fn removal_past_the_end_of_the_roster_is_not_found() {
        let pool = test_pool().await;
        let event = create_event(&pool, &pier39_event(None)).await.expect("create");

        assert!(matches!(
            remove_attendee(&pool, event.id, 0).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn metrics_round_trip_even_for_a_future_event() -> anyhow::Result<()> {
        let pool = test_pool().await;
        let event = create_event(&pool, &pier39_event(None)).await?;

        let metrics = PostEventMetrics {
            volunteers_attended: 4,
            visitors_engaged: 120,
            notes: "Busy afternoon, ran out of flyers.".to_string(),
        };
        save_metrics(&pool, &event.public_id, &metrics).await?;

        let event = get_event(&pool, &event.public_id).await?;
        let saved = event.post_event_metrics.expect("metrics present");
        assert_eq!(saved.volunteers_attended, 4);
        assert_eq!(saved.visitors_engaged, 120);
        assert_eq!(saved.notes, "Busy afternoon, ran out of flyers.");
        Ok(())
    }

    #[tokio::test]
    async fn notifications_list_newest_first_and_clear_completely() -> anyhow::Result<()> {
        let pool = test_pool().await;
        add_notification(&pool, "New event: Tabling at Pier 39").await?;
        add_notification(&pool, "New event: Marsh cleanup").await?;

        let notifications = get_notifications(&pool).await?;
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].message, "New event: Marsh cleanup");

        clear_notifications(&pool).await?;
        assert!(get_notifications(&pool).await?.is_empty());
        Ok(())
    }
}
