mod auth;
mod db;
mod error;
mod handlers;
mod models;
mod schedule;
mod signup;
mod state;
mod validate;

use axum::{
    Router,
    response::Html,
    routing::{delete, get, post, put},
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use state::AppState;
use std::env;
use std::str::FromStr;
use tower_http::{services::ServeDir, trace::TraceLayer};

async fn root_handler() -> Html<String> {
    tokio::fs::read_to_string("templates/index.html")
        .await
        .map(Html)
        .unwrap_or_else(|_| Html("<h1>Error: could not load index.html</h1>".to_string()))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let admin = auth::AdminCredentials::from_env();

    let connect_options = SqliteConnectOptions::from_str(&db_url)
        .expect("failed to parse DATABASE_URL")
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .expect("failed to connect to db");

    db::init_schema(&pool).await.expect("failed to create schema");
    tracing::info!("database ready");

    let app_state = AppState::new(pool, admin);

    let app = Router::new()
        .route("/", get(root_handler))
        .nest_service("/assets", ServeDir::new("assets"))
        .route("/api/admin/login", post(handlers::admin_login))
        .route("/api/admin/logout", post(handlers::admin_logout))
        .route(
            "/api/events",
            get(handlers::list_events).post(handlers::create_event_handler),
        )
        .route("/api/events/categorized", get(handlers::categorized_events))
        .route("/api/events/stream", get(handlers::subscribe_events))
        .route(
            "/api/events/{public_id}",
            get(handlers::get_event_details)
                .put(handlers::update_event_handler)
                .delete(handlers::delete_event_handler),
        )
        .route("/api/events/{public_id}/signups", post(handlers::sign_up_handler))
        .route(
            "/api/events/{public_id}/signups/{index}",
            delete(handlers::remove_attendee_handler),
        )
        .route("/api/events/{public_id}/metrics", put(handlers::save_metrics_handler))
        .route(
            "/api/notifications",
            get(handlers::list_notifications)
                .post(handlers::add_notification_handler)
                .delete(handlers::clear_notifications_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await.expect("server error");
}
