use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PageId = i32;
pub type ResourceId = i64;

/// Resource id -> new rank, sent as one atomic request
pub type ReorderBatch = HashMap<ResourceId, i32>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Song,
    Technical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Video,
    Photo,
    Document,
    MusicSheet,
    Audio,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub name: String,
    #[serde(rename = "type")]
    pub page_type: PageType,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    /// Present on list/get responses, absent on create/update ones
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub page_id: PageId,
    pub title: String,
    pub description: Option<String>,
    pub resource_type: ResourceType,
    pub file_path: Option<String>,
    pub external_url: Option<String>,
    pub order: i32,
    pub is_expanded: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreatePage {
    pub name: String,
    #[serde(rename = "type")]
    pub page_type: PageType,
    pub is_favorite: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub page_type: Option<PageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateResource {
    pub page_id: PageId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub resource_type: ResourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    pub is_expanded: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ResourceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(rename = "order", skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expanded: Option<bool>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserInfo {
    pub id: i32,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Token material exactly as the server hands it out
#[derive(Clone, Debug, Deserialize)]
pub struct TokenExchange {
    pub refresh_token: String,
    pub refresh_token_expires_at: String,
    pub access_token: String,
    pub access_token_expires_at: String,
}
