use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::uploads::UploadStore;

/// Shared server context, built once in `main` and passed to every handler
/// through axum's `State`. Components receive their collaborators from here
/// instead of reaching for globals.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub uploads: UploadStore,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        let uploads = UploadStore::new(&config.uploads);
        Self {
            pool,
            config: Arc::new(config),
            uploads,
        }
    }
}
