use std::sync::Arc;

use sqlx::PgPool;

use crate::{config::AppConfig, db::create_pool, repository::Repositories};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub repos: Repositories,
}

impl AppState {
    /// Postgres-backed state when `DATABASE_URL` is set, in-memory otherwise.
    pub fn build(config: AppConfig) -> Result<Self, sqlx::Error> {
        match create_pool(&config)? {
            Some(pool) => Ok(Self {
                config: Arc::new(config),
                repos: Repositories::postgres(pool.clone()),
                db_pool: Some(pool),
            }),
            None => {
                tracing::warn!("DATABASE_URL is not set, using the in-memory store");
                Ok(Self::in_memory(config))
            }
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            db_pool: None,
            repos: Repositories::memory(),
        }
    }
}
