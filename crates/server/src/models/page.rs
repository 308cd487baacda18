use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::ValidationError;
use crate::models::resource::ResourceResponse;
use crate::models::user::UserId;

pub type PageId = i32;

const PAGE_NAME_LENGTH_LIMIT: usize = 200;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[sqlx(type_name = "page_type")]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PageType {
    Song,
    Technical,
}

#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub page_type: PageType,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Partial update, absent fields stay unchanged
#[derive(Debug, Default, Deserialize)]
pub struct PageUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub page_type: Option<PageType>,
    pub is_favorite: Option<bool>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct PageResponse {
    pub id: PageId,
    #[serde(skip_serializing)]
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub page_type: PageType,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PageWithResources {
    #[serde(flatten)]
    pub page: PageResponse,
    pub resources: Vec<ResourceResponse>,
}

pub fn validate_page_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidInput {
            value: name.to_string(),
            reason: "page name cannot be empty".to_string(),
        });
    }
    if name.len() > PAGE_NAME_LENGTH_LIMIT {
        return Err(ValidationError::LimitExceeded {
            subject: "page name".to_string(),
            unit: "char".to_string(),
            attempted: name.len(),
            limit: PAGE_NAME_LENGTH_LIMIT,
        });
    }
    Ok(())
}
