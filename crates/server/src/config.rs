use std::fs::read_to_string;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::database::connection::DbConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory that holds uploaded resource files
    pub root: PathBuf,
    pub max_upload_bytes: Option<usize>,
}

impl StorageConfig {
    const MAX_UPLOAD_FALLBACK: usize = 100 * 1024 * 1024;

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes.unwrap_or(Self::MAX_UPLOAD_FALLBACK)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub access_token_ttl_minutes: Option<i64>,
    pub refresh_token_ttl_minutes: Option<i64>,
}

impl AuthConfig {
    const ACCESS_TTL_FALLBACK: i64 = 60 * 24 * 7;
    const REFRESH_TTL_FALLBACK: i64 = 60 * 24 * 30;

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(
            self.access_token_ttl_minutes
                .unwrap_or(Self::ACCESS_TTL_FALLBACK),
        )
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(
            self.refresh_token_ttl_minutes
                .unwrap_or(Self::REFRESH_TTL_FALLBACK),
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_yaml_file<P: Into<PathBuf>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.into();
        let content = read_to_string(&path).with_context(|| format!("path: {path:?}"))?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
