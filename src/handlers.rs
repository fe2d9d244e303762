use crate::{
    auth, db,
    error::AppError,
    models::{Event, Notification, PostEventMetrics, ShiftPreference},
    schedule::{self, Categorized},
    signup::{self, AdmissionError},
    state::AppState,
    validate::{self, EventForm, FormMode},
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};

fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// Reloads the full list and pushes it to every subscriber. Called after
/// each committed write, mirroring the snapshot-per-change contract of the
/// subscription channel.
async fn publish_events(state: &AppState) -> Result<(), AppError> {
    let events = db::get_all_events(&state.pool).await?;
    // No subscribers is fine.
    let _ = state.events_tx.send(events);
    Ok(())
}

pub async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, AppError> {
    db::get_all_events(&state.pool).await.map(Json)
}

pub async fn categorized_events(
    State(state): State<AppState>,
) -> Result<Json<Categorized>, AppError> {
    let events = db::get_all_events(&state.pool).await?;
    Ok(Json(schedule::categorize(events, now_local())))
}

/// SSE subscription: the current list immediately on connect, then the full
/// list again after every change.
pub async fn subscribe_events(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, axum::Error>>>, AppError> {
    let snapshot = db::get_all_events(&state.pool).await?;
    let updates = BroadcastStream::new(state.events_tx.subscribe()).filter_map(|update| update.ok());

    let stream = tokio_stream::once(snapshot)
        .chain(updates)
        .map(|events| SseEvent::default().event("events").json_data(&events));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn get_event_details(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> Result<Json<Event>, AppError> {
    db::get_event(&state.pool, &public_id).await.map(Json)
}

pub async fn create_event_handler(
    State(state): State<AppState>,
    Json(form): Json<EventForm>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let errors = validate::validate(&form, today_local(), FormMode::Create);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let new_event = form
        .to_new_event()
        .ok_or_else(|| AppError::BadRequest("Malformed event fields.".to_string()))?;

    let event = db::create_event(&state.pool, &new_event).await?;
    db::add_notification(&state.pool, &format!("New event: {}", event.title)).await?;
    publish_events(&state).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditEventPayload {
    #[serde(flatten)]
    pub form: EventForm,
    /// Editing an existing event onto a past date is allowed, but only with
    /// this explicit confirmation. Creation never is.
    #[serde(default)]
    pub allow_past: bool,
}

pub async fn update_event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
    Json(payload): Json<EditEventPayload>,
) -> Result<Json<Event>, AppError> {
    auth::require_admin(&state, &headers).await?;

    let today = today_local();
    let errors = validate::validate(&payload.form, today, FormMode::Edit);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    if validate::date_in_past(&payload.form, today) && !payload.allow_past {
        return Err(AppError::BadRequest(
            "You are setting a date in the past. Resubmit with allowPast to confirm.".to_string(),
        ));
    }
    let new_event = payload
        .form
        .to_new_event()
        .ok_or_else(|| AppError::BadRequest("Malformed event fields.".to_string()))?;

    let event = db::update_event(&state.pool, &public_id, &new_event).await?;
    publish_events(&state).await?;
    Ok(Json(event))
}

pub async fn delete_event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth::require_admin(&state, &headers).await?;
    db::delete_event(&state.pool, &public_id).await?;
    publish_events(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupPayload {
    pub name: String,
    pub email: String,
    pub shift_preference: ShiftPreference,
}

pub async fn sign_up_handler(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
    Json(payload): Json<SignupPayload>,
) -> Result<Response, AppError> {
    let event = db::get_event(&state.pool, &public_id).await?;

    match signup::check_admission(&event, &payload.name, &payload.email) {
        // Blank input gets no message and no write, matching the form's
        // disabled-button behavior.
        Err(AdmissionError::MissingFields) => return Ok(StatusCode::NO_CONTENT.into_response()),
        Err(AdmissionError::InvalidEmail) => {
            return Err(AppError::BadRequest(
                "Please enter a valid email address.".to_string(),
            ));
        }
        Err(AdmissionError::AlreadyRegistered) => {
            return Err(AppError::Conflict(
                "This email address is already registered for this event.".to_string(),
            ));
        }
        Ok(()) => {}
    }

    db::add_attendee(
        &state.pool,
        event.id,
        &payload.name,
        &payload.email,
        payload.shift_preference,
    )
    .await?;
    publish_events(&state).await?;
    Ok(StatusCode::CREATED.into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RemoveAttendeePayload {
    pub confirmed: bool,
}

pub async fn remove_attendee_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((public_id, index)): Path<(String, usize)>,
    Json(payload): Json<RemoveAttendeePayload>,
) -> Result<StatusCode, AppError> {
    auth::require_admin(&state, &headers).await?;
    if !payload.confirmed {
        return Err(AppError::BadRequest(
            "Attendee removal must be confirmed.".to_string(),
        ));
    }

    let event = db::get_event(&state.pool, &public_id).await?;
    db::remove_attendee(&state.pool, event.id, index).await?;
    publish_events(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn save_metrics_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
    Json(metrics): Json<PostEventMetrics>,
) -> Result<StatusCode, AppError> {
    auth::require_admin(&state, &headers).await?;
    db::save_metrics(&state.pool, &public_id, &metrics).await?;
    publish_events(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub token: String,
}

pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginPayload>,
) -> Result<Json<AdminLoginResponse>, AppError> {
    match auth::issue_session(&state, &payload.username, &payload.password).await {
        Some(token) => Ok(Json(AdminLoginResponse { token })),
        None => Err(AppError::Unauthorized(
            "Invalid credentials. Please try again.".to_string(),
        )),
    }
}

pub async fn admin_logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    auth::revoke_session(&state, &headers).await;
    StatusCode::NO_CONTENT
}

pub async fn list_notifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, AppError> {
    db::get_notifications(&state.pool).await.map(Json)
}

#[derive(Debug, Deserialize)]
pub struct NotificationPayload {
    pub message: String,
}

pub async fn add_notification_handler(
    State(state): State<AppState>,
    Json(payload): Json<NotificationPayload>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    if payload.message.trim().is_empty() {
        return Err(AppError::BadRequest("Notification message is required.".to_string()));
    }
    let notification = db::add_notification(&state.pool, &payload.message).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn clear_notifications_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    auth::require_admin(&state, &headers).await?;
    db::clear_notifications(&state.pool).await?;
    Ok(StatusCode::NO_CONTENT)
}
