use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::ApiError;
use crate::wire::TokenExchange;

#[derive(Clone, Debug, PartialEq)]
pub struct SessionTokens {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl SessionTokens {
    pub fn from_exchange(exchange: &TokenExchange) -> Result<Self, ApiError> {
        let parse = |value: &str| {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ApiError::Api(format!("malformed token expiry `{value}`: {e}")))
        };
        Ok(Self {
            access_token: exchange.access_token.clone(),
            access_token_expires_at: parse(&exchange.access_token_expires_at)?,
            refresh_token: exchange.refresh_token.clone(),
            refresh_token_expires_at: parse(&exchange.refresh_token_expires_at)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Active(SessionTokens),
    /// The server answered 401, the stored credential is no longer good
    Expired,
}

/// Process-wide session state. Views subscribe to transitions instead of
/// re-checking the credential themselves; the data layer flips it to
/// `Expired` on any 401.
pub struct SessionContext {
    state: watch::Sender<SessionState>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self { state }
    }

    pub fn set(&self, tokens: SessionTokens) {
        self.state.send_replace(SessionState::Active(tokens));
    }

    /// 401 path: the credential is dead until the user logs in again
    pub fn invalidate(&self) {
        self.state.send_replace(SessionState::Expired);
    }

    /// Deliberate logout, distinct from expiry
    pub fn clear(&self) {
        self.state.send_replace(SessionState::Unauthenticated);
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.state.borrow(), SessionState::Active(_))
    }

    pub fn bearer(&self) -> Option<String> {
        match &*self.state.borrow() {
            SessionState::Active(tokens) => Some(tokens.access_token.clone()),
            _ => None,
        }
    }

    pub fn refresh_bearer(&self) -> Option<String> {
        match &*self.state.borrow() {
            SessionState::Active(tokens) => Some(tokens.refresh_token.clone()),
            _ => None,
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
