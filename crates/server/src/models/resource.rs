use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::ValidationError;
use crate::models::page::PageId;

pub type ResourceId = i64;

const RESOURCE_TITLE_LENGTH_LIMIT: usize = 200;
const DESCRIPTION_LENGTH_LIMIT: usize = 10_000;
const EXTERNAL_URL_LENGTH_LIMIT: usize = 2048;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[sqlx(type_name = "resource_type")]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceType {
    Video,
    Photo,
    Document,
    MusicSheet,
    Audio,
}

#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    pub page_id: PageId,
    pub title: String,
    pub description: Option<String>,
    pub resource_type: ResourceType,
    pub file_path: Option<String>,
    pub external_url: Option<String>,
    #[serde(default = "default_expanded")]
    pub is_expanded: bool,
}

fn default_expanded() -> bool {
    true
}

/// Partial update, absent fields stay unchanged
#[derive(Debug, Default, Deserialize)]
pub struct ResourceUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub resource_type: Option<ResourceType>,
    pub file_path: Option<String>,
    pub external_url: Option<String>,
    #[serde(rename = "order")]
    pub display_order: Option<i32>,
    pub is_expanded: Option<bool>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ResourceResponse {
    pub id: ResourceId,
    pub page_id: PageId,
    pub title: String,
    pub description: Option<String>,
    pub resource_type: ResourceType,
    pub file_path: Option<String>,
    pub external_url: Option<String>,
    #[serde(rename = "order")]
    pub display_order: i32,
    pub is_expanded: bool,
    pub created_at: DateTime<Utc>,
}

/// Wire shape of `PUT /api/resources/reorder`: resource id -> new rank
pub type ReorderBatch = HashMap<ResourceId, i32>;

pub fn validate_resource_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::InvalidInput {
            value: title.to_string(),
            reason: "resource title cannot be empty".to_string(),
        });
    }
    if title.len() > RESOURCE_TITLE_LENGTH_LIMIT {
        return Err(ValidationError::LimitExceeded {
            subject: "resource title".to_string(),
            unit: "char".to_string(),
            attempted: title.len(),
            limit: RESOURCE_TITLE_LENGTH_LIMIT,
        });
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.len() > DESCRIPTION_LENGTH_LIMIT {
        return Err(ValidationError::LimitExceeded {
            subject: "resource description".to_string(),
            unit: "char".to_string(),
            attempted: description.len(),
            limit: DESCRIPTION_LENGTH_LIMIT,
        });
    }
    Ok(())
}

pub fn validate_external_url(url: &str) -> Result<(), ValidationError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ValidationError::InvalidInput {
            value: url.to_string(),
            reason: "external url must use http or https".to_string(),
        });
    }
    if url.len() > EXTERNAL_URL_LENGTH_LIMIT {
        return Err(ValidationError::LimitExceeded {
            subject: "external url".to_string(),
            unit: "char".to_string(),
            attempted: url.len(),
            limit: EXTERNAL_URL_LENGTH_LIMIT,
        });
    }
    Ok(())
}

/// Exactly one of file path / external url carries the content
pub fn validate_content_source(
    file_path: Option<&str>,
    external_url: Option<&str>,
) -> Result<(), ValidationError> {
    match (file_path, external_url) {
        (Some(_), Some(_)) => Err(ValidationError::InvalidInput {
            value: "file_path, external_url".to_string(),
            reason: "resource cannot have both a file and an external url".to_string(),
        }),
        (None, None) => Err(ValidationError::InvalidInput {
            value: "file_path, external_url".to_string(),
            reason: "resource needs either a file or an external url".to_string(),
        }),
        (Some(_), None) => Ok(()),
        (None, Some(url)) => validate_external_url(url),
    }
}

/// A reorder batch is applied only when it covers exactly the page's
/// resources and assigns each a unique rank in 0..n. Anything else leaves
/// the stored ranks untouched.
pub fn validate_reorder_batch(
    current_ids: &[ResourceId],
    batch: &ReorderBatch,
) -> Result<(), ValidationError> {
    if batch.is_empty() {
        return Err(ValidationError::InvalidInput {
            value: "{}".to_string(),
            reason: "reorder batch cannot be empty".to_string(),
        });
    }
    for id in current_ids {
        if !batch.contains_key(id) {
            return Err(ValidationError::InvalidInput {
                value: id.to_string(),
                reason: "reorder batch must cover every resource of the page".to_string(),
            });
        }
    }
    for id in batch.keys() {
        if !current_ids.contains(id) {
            return Err(ValidationError::InvalidInput {
                value: id.to_string(),
                reason: "reorder batch names a resource not on the page".to_string(),
            });
        }
    }
    let mut orders: Vec<i32> = batch.values().copied().collect();
    orders.sort_unstable();
    for (rank, order) in orders.iter().enumerate() {
        if *order != rank as i32 {
            return Err(ValidationError::InvalidInput {
                value: order.to_string(),
                reason: format!(
                    "reorder batch must assign each rank in 0..{} exactly once",
                    batch.len()
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(pairs: &[(ResourceId, i32)]) -> ReorderBatch {
        pairs.iter().copied().collect()
    }

    #[test]
    fn accepts_any_permutation() {
        let ids = [10, 20, 30];
        assert!(validate_reorder_batch(&ids, &batch(&[(10, 0), (20, 1), (30, 2)])).is_ok());
        assert!(validate_reorder_batch(&ids, &batch(&[(10, 2), (20, 0), (30, 1)])).is_ok());
        assert!(validate_reorder_batch(&ids, &batch(&[(10, 1), (20, 2), (30, 0)])).is_ok());
    }

    #[test]
    fn rejects_empty_batch() {
        assert!(validate_reorder_batch(&[], &batch(&[])).is_err());
    }

    #[test]
    fn rejects_batch_missing_a_page_resource() {
        let ids = [10, 20, 30];
        assert!(validate_reorder_batch(&ids, &batch(&[(10, 0), (20, 1)])).is_err());
    }

    #[test]
    fn rejects_batch_with_foreign_resource() {
        let ids = [10, 20];
        assert!(validate_reorder_batch(&ids, &batch(&[(10, 0), (20, 1), (99, 2)])).is_err());
    }

    #[test]
    fn rejects_duplicate_and_out_of_range_ranks() {
        let ids = [10, 20, 30];
        assert!(validate_reorder_batch(&ids, &batch(&[(10, 0), (20, 0), (30, 1)])).is_err());
        assert!(validate_reorder_batch(&ids, &batch(&[(10, 0), (20, 1), (30, 3)])).is_err());
        assert!(validate_reorder_batch(&ids, &batch(&[(10, -1), (20, 0), (30, 1)])).is_err());
    }

    #[test]
    fn content_source_is_mutually_exclusive() {
        assert!(validate_content_source(Some("song/a.mp4"), None).is_ok());
        assert!(validate_content_source(None, Some("https://youtu.be/x")).is_ok());
        assert!(validate_content_source(Some("a"), Some("https://b")).is_err());
        assert!(validate_content_source(None, None).is_err());
    }

    #[test]
    fn external_url_needs_http_scheme() {
        assert!(validate_external_url("https://example.com/v").is_ok());
        assert!(validate_external_url("ftp://example.com/v").is_err());
        assert!(validate_external_url("javascript:alert(1)").is_err());
        assert!(validate_external_url(&format!("https://e.com/{}", "x".repeat(2048))).is_err());
    }

    #[test]
    fn resource_type_parses_wire_names() {
        assert_eq!(
            "music_sheet".parse::<ResourceType>().unwrap(),
            ResourceType::MusicSheet
        );
        assert_eq!("audio".parse::<ResourceType>().unwrap(), ResourceType::Audio);
        assert!("midi".parse::<ResourceType>().is_err());
    }
}
