use axum::http::{HeaderMap, header};
use nanoid::nanoid;

use crate::{error::AppError, state::AppState};

/// Admin credentials are deployment configuration, loaded from the
/// environment next to `DATABASE_URL`. They are only ever compared
/// server-side; clients hold a session token, never the password.
#[derive(Debug)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl AdminCredentials {
    pub fn from_env() -> Self {
        let username = std::env::var("ADMIN_USERNAME").expect("ADMIN_USERNAME must be set");
        let password = std::env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD must be set");
        Self { username, password }
    }
}

/// Checks the submitted credentials and, on a match, mints an opaque
/// session token that privileged routes will accept as a bearer token.
pub async fn issue_session(state: &AppState, username: &str, password: &str) -> Option<String> {
    if username != state.admin.username || password != state.admin.password {
        return None;
    }
    let token = nanoid!(32);
    state.sessions.lock().await.insert(token.clone());
    Some(token)
}

pub async fn revoke_session(state: &AppState, headers: &HeaderMap) {
    if let Some(token) = bearer_token(headers) {
        state.sessions.lock().await.remove(token);
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Precondition helper for admin-only handlers.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(token) = bearer_token(headers) else {
        return Err(AppError::Unauthorized("Admin login required.".to_string()));
    };
    if state.sessions.lock().await.contains(token) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Admin login required.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_state() -> AppState {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory db");
        AppState::new(
            pool,
            AdminCredentials {
                username: "admin".to_string(),
                password: "hunter2".to_string(),
            },
        )
    }

    fn headers_with_token(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
        );
        headers
    }

    #[tokio::test]
    async fn wrong_credentials_issue_nothing() {
        let state = test_state().await;
        assert!(issue_session(&state, "admin", "wrong").await.is_none());
        assert!(issue_session(&state, "someone", "hunter2").await.is_none());
    }

    #[tokio::test]
    async fn issued_token_opens_admin_routes_until_revoked() {
        let state = test_state().await;
        let token = issue_session(&state, "admin", "hunter2").await.expect("token");

        let headers = headers_with_token(&token);
        assert!(require_admin(&state, &headers).await.is_ok());

        revoke_session(&state, &headers).await;
        assert!(require_admin(&state, &headers).await.is_err());
    }

    #[tokio::test]
    async fn missing_or_unknown_tokens_are_refused() {
        let state = test_state().await;
        assert!(require_admin(&state, &HeaderMap::new()).await.is_err());
        assert!(
            require_admin(&state, &headers_with_token("not-a-session"))
                .await
                .is_err()
        );
    }
}
