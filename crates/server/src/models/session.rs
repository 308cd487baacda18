use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;

use crate::models::user::UserId;

pub type SessionId = sqlx::types::Uuid;

/// SHA-256 digest of a raw session token as stored in the database
pub type TokenDigest = Vec<u8>;

#[derive(Clone, Debug)]
pub struct NewSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub ip: IpNetwork,
    pub refresh_token_sha: TokenDigest,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub access_token_sha: TokenDigest,
    pub access_token_expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ResolveSessionRow {
    pub user_id: UserId,
    pub access_token_sha: TokenDigest,
    pub access_token_expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct RefreshSessionRow {
    pub user_id: UserId,
    pub refresh_token_sha: TokenDigest,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct RotateTokensRequest {
    pub session_id: SessionId,
    pub refresh_token_sha: TokenDigest,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub access_token_sha: TokenDigest,
    pub access_token_expires_at: DateTime<Utc>,
}
