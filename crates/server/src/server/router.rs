use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tracing::info;

use crate::server::state::AppState;
use crate::server::{auth, pages, resources};

pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.server.address.clone();
    let max_upload = state.config.storage.max_upload_bytes();
    let app = Router::new()
        .route("/", get(root))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/pages/", get(pages::list_pages).post(pages::create_page))
        .route(
            "/api/pages/:page_id",
            get(pages::get_page)
                .put(pages::update_page)
                .delete(pages::delete_page),
        )
        .route(
            "/api/resources/",
            get(resources::list_resources).post(resources::create_resource),
        )
        .route("/api/resources/reorder", put(resources::reorder_resources))
        .route(
            "/api/resources/upload/:page_id",
            post(resources::upload_resource).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/api/resources/file/*path", get(resources::serve_file))
        .route(
            "/api/resources/:resource_id",
            get(resources::get_resource)
                .put(resources::update_resource)
                .delete(resources::delete_resource),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("starting server on: {}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "muro api" }))
}
