use std::sync::Arc;

use anyhow::anyhow;
use tracing::error;

use jiseti_db::Database;

use crate::error::ApiError;
use crate::notify::Notifier;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub settings: Settings,
    pub notifier: Notifier,
}

/// Runtime knobs the handlers need. Loaded by the server from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// Accepted signup domain, e.g. `gmail.com`. `None` accepts any domain.
    pub email_domain: Option<String>,
}

impl Settings {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl: chrono::Duration::hours(24),
            email_domain: Some("gmail.com".to_string()),
        }
    }
}

/// Run store work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow!("blocking task failed: {}", e))
    })?
}
