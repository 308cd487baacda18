use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use futures::future::join_all;
use serde_json::{json, Value};

use crate::auth::token::Claims;
use crate::error::RequestError;
use crate::models::page::{CreatePageRequest, PageId, PageResponse, PageUpdate, PageWithResources};
use crate::server::state::AppState;

pub async fn list_pages(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<Vec<PageWithResources>>, RequestError> {
    let pages = state
        .db_connection
        .list_pages_with_resources(claims.user_id)
        .await?;
    Ok(Json(pages))
}

pub async fn get_page(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(page_id): Path<PageId>,
) -> Result<Json<PageWithResources>, RequestError> {
    let page = state
        .db_connection
        .get_page_with_resources(claims.user_id, page_id)
        .await?;
    Ok(Json(page))
}

pub async fn create_page(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(request): Json<CreatePageRequest>,
) -> Result<Json<PageResponse>, RequestError> {
    let page = state
        .db_connection
        .create_page(claims.user_id, &request)
        .await?;
    Ok(Json(page))
}

pub async fn update_page(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(page_id): Path<PageId>,
    Json(update): Json<PageUpdate>,
) -> Result<Json<PageResponse>, RequestError> {
    let page = state
        .db_connection
        .update_page(claims.user_id, page_id, &update)
        .await?;
    Ok(Json(page))
}

pub async fn delete_page(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(page_id): Path<PageId>,
) -> Result<Json<Value>, RequestError> {
    let orphaned_files = state
        .db_connection
        .delete_page(claims.user_id, page_id)
        .await?;
    join_all(
        orphaned_files
            .iter()
            .map(|file_path| state.storage.remove(file_path)),
    )
    .await;
    Ok(Json(json!({ "message": "Page deleted successfully" })))
}
