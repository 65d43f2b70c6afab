use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::notifications::Notifier;
use crate::services::rate_limit::RateLimiter;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub notifier: Box<dyn Notifier>,
    pub rate_limiter: Box<dyn RateLimiter>,
}

impl AppState {
    /// Locks the connection. Never hold the guard across an `.await`.
    pub fn db(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))
    }
}
