use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ValidationError;

pub type UserId = i32;

const USER_EMAIL_LENGTH_LIMIT: usize = 254;
const USER_PASSWORD_MIN_LENGTH: usize = 8;
const USER_PASSWORD_MAX_LENGTH: usize = 80;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UserCredentials {
    pub id: UserId,
    pub password_hash: String,
}

pub fn validate_user_email(email: &str) -> Result<(), ValidationError> {
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !well_formed || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidInput {
            value: email.to_string(),
            reason: "email address is malformed".to_string(),
        });
    }
    if email.len() > USER_EMAIL_LENGTH_LIMIT {
        return Err(ValidationError::LimitExceeded {
            subject: "email".to_string(),
            unit: "char".to_string(),
            attempted: email.len(),
            limit: USER_EMAIL_LENGTH_LIMIT,
        });
    }
    Ok(())
}

pub fn validate_user_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < USER_PASSWORD_MIN_LENGTH || password.len() > USER_PASSWORD_MAX_LENGTH {
        return Err(ValidationError::InvalidInput {
            value: "<password>".to_string(),
            reason: format!(
                "password should be at least {} and at most {} characters long",
                USER_PASSWORD_MIN_LENGTH, USER_PASSWORD_MAX_LENGTH
            ),
        });
    }
    Ok(())
}
