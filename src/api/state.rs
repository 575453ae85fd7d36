use std::sync::Arc;

use crate::api::error::ApiError;
use crate::config::AppConfig;
use crate::storage::{ResultStore, StoreResult};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResultStore>,
    pub config: Arc<AppConfig>,
    pub version: String,
}

impl AppState {
    pub fn new(store: Arc<dyn ResultStore>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Run a blocking store call off the async workers.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&dyn ResultStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || f(store.as_ref())).await?;
        Ok(result?)
    }
}
