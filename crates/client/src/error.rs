use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("session expired or unauthenticated")]
    Unauthenticated,
    /// A rejection the server explained, surfaced verbatim
    #[error("{0}")]
    Api(String),
    #[error("network error: {0}")]
    Transport(String),
}

fn message_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_string)
}

/// Message preference order: the structured `error` field from the response
/// body, then the canonical status text, then a plain fallback
pub(crate) fn normalize(status: u16, canonical: Option<&str>, body: &str) -> ApiError {
    if status == 401 {
        return ApiError::Unauthenticated;
    }
    if let Some(message) = message_from_body(body) {
        return ApiError::Api(message);
    }
    match canonical {
        Some(reason) => ApiError::Api(format!("HTTP {status} {reason}")),
        None => ApiError::Api(format!("request failed with status {status}")),
    }
}
