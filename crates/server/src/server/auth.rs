use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use base64::prelude::BASE64_STANDARD as BASE64;
use base64::Engine;
use ipnetwork::IpNetwork;
use serde_json::{json, Value};

use crate::auth::token::{AuthPayload, Claims, TokenExchangePayload};
use crate::auth::utils::unpack_session_id_and_token;
use crate::error::RequestError;
use crate::models::user::UserResponse;
use crate::server::state::AppState;

pub async fn register(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<AuthPayload>,
) -> Result<Json<UserResponse>, RequestError> {
    state.auth_limiter.check(addr.ip())?;
    let user = state
        .db_connection
        .register_user(&payload.email, &payload.password)
        .await?;
    Ok(Json(user))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<AuthPayload>,
) -> Result<Json<TokenExchangePayload>, RequestError> {
    state.auth_limiter.check(addr.ip())?;
    let payload = state
        .db_connection
        .login(
            &payload.email,
            &payload.password,
            IpNetwork::from(addr.ip()),
            &state.config.auth,
        )
        .await?;
    Ok(Json(payload))
}

/// The bearer on this endpoint is the refresh credential, not the access
/// one
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<TokenExchangePayload>, RequestError> {
    let packed = BASE64
        .decode(bearer.token())
        .map_err(|_| RequestError::BadCredentials)?;
    let (sid, refresh_token) =
        unpack_session_id_and_token(&packed).ok_or(RequestError::BadCredentials)?;
    let payload = state
        .db_connection
        .refresh_session(&sid, refresh_token, &state.config.auth)
        .await?;
    Ok(Json(payload))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<Value>, RequestError> {
    state.db_connection.logout(&claims.session_id).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<UserResponse>, RequestError> {
    let user = state.db_connection.get_user(claims.user_id).await?;
    Ok(Json(user))
}
