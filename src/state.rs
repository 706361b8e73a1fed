use redis::aio::ConnectionManager;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::jobs::JobQueue;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    /// Optional: the server runs without Redis, degrading caching and the
    /// PKCE state store to database-backed fallbacks.
    pub redis: Option<ConnectionManager>,
    pub config: Arc<Config>,
    pub job_queue: JobQueue,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        redis: Option<ConnectionManager>,
        config: Config,
        job_queue: JobQueue,
    ) -> Self {
        Self {
            db,
            redis,
            config: Arc::new(config),
            job_queue,
        }
    }
}
