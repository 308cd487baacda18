use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::token::Claims;
use crate::error::{RequestError, ValidationError};
use crate::models::page::PageId;
use crate::models::resource::{
    CreateResourceRequest, ReorderBatch, ResourceId, ResourceResponse, ResourceType,
    ResourceUpdate,
};
use crate::server::state::AppState;
use crate::storage;

#[derive(Debug, Deserialize)]
pub struct ResourceListQuery {
    pub page_id: Option<PageId>,
}

pub async fn list_resources(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Query(query): Query<ResourceListQuery>,
) -> Result<Json<Vec<ResourceResponse>>, RequestError> {
    let resources = state
        .db_connection
        .list_resources(claims.user_id, query.page_id)
        .await?;
    Ok(Json(resources))
}

pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(resource_id): Path<ResourceId>,
) -> Result<Json<ResourceResponse>, RequestError> {
    let resource = state
        .db_connection
        .get_resource(claims.user_id, resource_id)
        .await?;
    Ok(Json(resource))
}

/// JSON creation path, used for external links or for re-registering an
/// already stored file
pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(request): Json<CreateResourceRequest>,
) -> Result<Json<ResourceResponse>, RequestError> {
    let resource = state
        .db_connection
        .create_resource(claims.user_id, &request)
        .await?;
    Ok(Json(resource))
}

fn bad_multipart(reason: &str) -> RequestError {
    ValidationError::InvalidInput {
        value: "multipart body".to_string(),
        reason: reason.to_string(),
    }
    .into()
}

pub async fn upload_resource(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(page_id): Path<PageId>,
    mut multipart: Multipart,
) -> Result<Json<ResourceResponse>, RequestError> {
    let page = state
        .db_connection
        .get_page_with_resources(claims.user_id, page_id)
        .await?
        .page;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut resource_type: Option<ResourceType> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_multipart(&e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| bad_multipart("file field needs a filename"))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_multipart(&e.to_string()))?;
                file = Some((filename, data.to_vec()));
            }
            Some("title") => {
                title = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_multipart(&e.to_string()))?,
                );
            }
            Some("description") => {
                description = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_multipart(&e.to_string()))?,
                );
            }
            Some("resource_type") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_multipart(&e.to_string()))?;
                resource_type = Some(text.parse().map_err(|_| {
                    RequestError::from(ValidationError::InvalidInput {
                        value: text.clone(),
                        reason: "unknown resource type".to_string(),
                    })
                })?);
            }
            _ => continue,
        }
    }
    let (filename, data) = file.ok_or_else(|| bad_multipart("upload needs a file field"))?;
    let limit = state.config.storage.max_upload_bytes();
    if data.len() > limit {
        return Err(ValidationError::LimitExceeded {
            subject: "upload".to_string(),
            unit: "byte".to_string(),
            attempted: data.len(),
            limit,
        }
        .into());
    }

    let resource_type = resource_type.unwrap_or_else(|| storage::infer_resource_type(&filename));
    let relative = state
        .storage
        .save(page.page_type, &page.name, &filename, &data)
        .await?;
    let request = CreateResourceRequest {
        page_id,
        title: title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| filename.clone()),
        description,
        resource_type,
        file_path: Some(relative.clone()),
        external_url: None,
        is_expanded: true,
    };
    match state.db_connection.create_resource(claims.user_id, &request).await {
        Ok(resource) => Ok(Json(resource)),
        Err(e) => {
            // don't leave an unregistered file behind
            state.storage.remove(&relative).await;
            Err(e)
        }
    }
}

pub async fn update_resource(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(resource_id): Path<ResourceId>,
    Json(update): Json<ResourceUpdate>,
) -> Result<Json<ResourceResponse>, RequestError> {
    let resource = state
        .db_connection
        .update_resource(claims.user_id, resource_id, &update)
        .await?;
    Ok(Json(resource))
}

pub async fn reorder_resources(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(batch): Json<ReorderBatch>,
) -> Result<Json<Vec<ResourceResponse>>, RequestError> {
    let reordered = state
        .db_connection
        .reorder_resources(claims.user_id, &batch)
        .await?;
    Ok(Json(reordered))
}

pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(resource_id): Path<ResourceId>,
) -> Result<Json<Value>, RequestError> {
    let orphaned_file = state
        .db_connection
        .delete_resource(claims.user_id, resource_id)
        .await?;
    if let Some(file_path) = &orphaned_file {
        state.storage.remove(file_path).await;
    }
    Ok(Json(json!({ "message": "Resource deleted successfully" })))
}

/// Streams a stored upload, only for files registered to a resource the
/// caller owns
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(path): Path<String>,
) -> Result<Response, RequestError> {
    storage::validate_relative_path(&path)?;
    if !state
        .db_connection
        .resource_file_registered(claims.user_id, &path)
        .await?
    {
        return Err(RequestError::NotFound);
    }
    let stream = state.storage.open_stream(&path).await?;
    let headers = [(header::CONTENT_TYPE, storage::guess_content_type(&path))];
    Ok((headers, Body::from_stream(stream)).into_response())
}
