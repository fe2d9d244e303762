use std::collections::HashSet;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::{Mutex, broadcast};

use crate::auth::AdminCredentials;
use crate::models::Event;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    /// Every committed write publishes the full current event list here;
    /// the SSE endpoint fans it out to subscribed browsers.
    pub events_tx: broadcast::Sender<Vec<Event>>,
    pub admin: Arc<AdminCredentials>,
    pub sessions: Arc<Mutex<HashSet<String>>>,
}

impl AppState {
    pub fn new(pool: SqlitePool, admin: AdminCredentials) -> Self {
        let (events_tx, _) = broadcast::channel(16);
        Self {
            pool,
            events_tx,
            admin: Arc::new(admin),
            sessions: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}
