use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::error::{self, ApiError};
use crate::ordering::{PageBackend, ResourceBackend};
use crate::session::{SessionContext, SessionTokens};
use crate::wire::{
    CreatePage, CreateResource, Page, PageId, PageUpdate, ReorderBatch, Resource, ResourceId,
    ResourceType, ResourceUpdate, TokenExchange, UserInfo,
};

/// Typed data layer over the REST surface. Injects the active bearer into
/// every protected call and flips the session context on 401.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionContext>,
}

/// Optional text fields accompanying a multipart upload
#[derive(Clone, Debug, Default)]
pub struct UploadOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub resource_type: Option<ResourceType>,
}

impl ApiClient {
    pub fn new<S: Into<String>>(base_url: S, session: Arc<SessionContext>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.bearer() {
            Some(bearer) => request.bearer_auth(bearer),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            debug!("request rejected as unauthenticated, invalidating session");
            self.session.invalidate();
            return Err(ApiError::Unauthenticated);
        }
        let canonical = status.canonical_reason();
        let body = response.text().await.unwrap_or_default();
        Err(error::normalize(status.as_u16(), canonical, &body))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    // auth

    pub async fn register(&self, email: &str, password: &str) -> Result<UserInfo, ApiError> {
        let request = self
            .http
            .post(self.url("/api/auth/register"))
            .json(&json!({ "email": email, "password": password }));
        Self::decode(self.send(request).await?).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, ApiError> {
        let request = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }));
        let exchange: TokenExchange = Self::decode(self.send(request).await?).await?;
        let tokens = SessionTokens::from_exchange(&exchange)?;
        self.session.set(tokens.clone());
        Ok(tokens)
    }

    /// Trade the refresh credential for a fresh token pair
    pub async fn refresh(&self) -> Result<SessionTokens, ApiError> {
        let refresh_bearer = self
            .session
            .refresh_bearer()
            .ok_or(ApiError::Unauthenticated)?;
        let request = self
            .http
            .post(self.url("/api/auth/refresh"))
            .bearer_auth(refresh_bearer);
        let exchange: TokenExchange = Self::decode(self.send(request).await?).await?;
        let tokens = SessionTokens::from_exchange(&exchange)?;
        self.session.set(tokens.clone());
        Ok(tokens)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let request = self.authorized(self.http.post(self.url("/api/auth/logout")));
        self.send(request).await?;
        self.session.clear();
        Ok(())
    }

    pub async fn me(&self) -> Result<UserInfo, ApiError> {
        let request = self.authorized(self.http.get(self.url("/api/auth/me")));
        Self::decode(self.send(request).await?).await
    }

    // pages

    pub async fn list_pages(&self) -> Result<Vec<Page>, ApiError> {
        let request = self.authorized(self.http.get(self.url("/api/pages/")));
        Self::decode(self.send(request).await?).await
    }

    pub async fn get_page(&self, page_id: PageId) -> Result<Page, ApiError> {
        let request = self.authorized(self.http.get(self.url(&format!("/api/pages/{page_id}"))));
        Self::decode(self.send(request).await?).await
    }

    pub async fn create_page(&self, page: &CreatePage) -> Result<Page, ApiError> {
        let request = self.authorized(self.http.post(self.url("/api/pages/")).json(page));
        Self::decode(self.send(request).await?).await
    }

    pub async fn update_page(&self, page_id: PageId, update: &PageUpdate) -> Result<Page, ApiError> {
        let request = self.authorized(
            self.http
                .put(self.url(&format!("/api/pages/{page_id}")))
                .json(update),
        );
        Self::decode(self.send(request).await?).await
    }

    pub async fn delete_page(&self, page_id: PageId) -> Result<(), ApiError> {
        let request = self.authorized(self.http.delete(self.url(&format!("/api/pages/{page_id}"))));
        self.send(request).await?;
        Ok(())
    }

    // resources

    pub async fn list_resources(&self, page_id: Option<PageId>) -> Result<Vec<Resource>, ApiError> {
        let mut request = self.authorized(self.http.get(self.url("/api/resources/")));
        if let Some(page_id) = page_id {
            request = request.query(&[("page_id", page_id)]);
        }
        Self::decode(self.send(request).await?).await
    }

    pub async fn get_resource(&self, resource_id: ResourceId) -> Result<Resource, ApiError> {
        let request = self.authorized(
            self.http
                .get(self.url(&format!("/api/resources/{resource_id}"))),
        );
        Self::decode(self.send(request).await?).await
    }

    pub async fn create_resource(&self, resource: &CreateResource) -> Result<Resource, ApiError> {
        let request = self.authorized(self.http.post(self.url("/api/resources/")).json(resource));
        Self::decode(self.send(request).await?).await
    }

    pub async fn upload_resource(
        &self,
        page_id: PageId,
        filename: &str,
        content: Vec<u8>,
        options: UploadOptions,
    ) -> Result<Resource, ApiError> {
        let mut form = Form::new().part("file", Part::bytes(content).file_name(filename.to_string()));
        if let Some(title) = options.title {
            form = form.text("title", title);
        }
        if let Some(description) = options.description {
            form = form.text("description", description);
        }
        if let Some(resource_type) = options.resource_type {
            let name = serde_json::to_value(resource_type)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            form = form.text("resource_type", name);
        }
        let request = self.authorized(
            self.http
                .post(self.url(&format!("/api/resources/upload/{page_id}")))
                .multipart(form),
        );
        Self::decode(self.send(request).await?).await
    }

    pub async fn update_resource(
        &self,
        resource_id: ResourceId,
        update: &ResourceUpdate,
    ) -> Result<Resource, ApiError> {
        let request = self.authorized(
            self.http
                .put(self.url(&format!("/api/resources/{resource_id}")))
                .json(update),
        );
        Self::decode(self.send(request).await?).await
    }

    pub async fn reorder_resources(&self, batch: &ReorderBatch) -> Result<Vec<Resource>, ApiError> {
        let request = self.authorized(self.http.put(self.url("/api/resources/reorder")).json(batch));
        Self::decode(self.send(request).await?).await
    }

    pub async fn delete_resource(&self, resource_id: ResourceId) -> Result<(), ApiError> {
        let request = self.authorized(
            self.http
                .delete(self.url(&format!("/api/resources/{resource_id}"))),
        );
        self.send(request).await?;
        Ok(())
    }

    /// Where a stored upload can be streamed from
    pub fn file_url(&self, file_path: &str) -> String {
        self.url(&format!("/api/resources/file/{file_path}"))
    }
}

impl ResourceBackend for ApiClient {
    async fn list_resources(&self, page_id: PageId) -> Result<Vec<Resource>, ApiError> {
        ApiClient::list_resources(self, Some(page_id)).await
    }

    async fn update_resource(
        &self,
        resource_id: ResourceId,
        update: &ResourceUpdate,
    ) -> Result<Resource, ApiError> {
        ApiClient::update_resource(self, resource_id, update).await
    }

    async fn reorder_resources(&self, batch: &ReorderBatch) -> Result<Vec<Resource>, ApiError> {
        ApiClient::reorder_resources(self, batch).await
    }
}

impl PageBackend for ApiClient {
    async fn update_page(&self, page_id: PageId, update: &PageUpdate) -> Result<Page, ApiError> {
        ApiClient::update_page(self, page_id, update).await
    }
}
