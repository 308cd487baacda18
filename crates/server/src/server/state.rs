use crate::auth::limit::AuthRateLimiter;
use crate::config::AppConfig;
use crate::database::connection::DbConnection;
use crate::storage::Storage;

pub struct AppState {
    pub config: AppConfig,
    pub db_connection: DbConnection,
    pub storage: Storage,
    pub auth_limiter: AuthRateLimiter,
}

impl AppState {
    pub async fn try_init(config: &AppConfig) -> anyhow::Result<Self> {
        let db_connection = DbConnection::connect(&config.database).await?;
        let storage = Storage::new(&config.storage.root);
        storage.ensure_root().await?;
        Ok(Self {
            config: config.clone(),
            db_connection,
            storage,
            auth_limiter: AuthRateLimiter::new(),
        })
    }
}
