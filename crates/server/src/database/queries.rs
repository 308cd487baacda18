use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Error as SqlxError, PgExecutor};
use tracing::{error, instrument};

use crate::auth::utils::{digests_match, token_digest};
use crate::database::connection::DbConnection;
use crate::database::utils::map_not_found_as_none;
use crate::error::{RequestError, SessionError};
use crate::models::page::{PageId, PageResponse, PageWithResources};
use crate::models::resource::{ResourceId, ResourceResponse};
use crate::models::session::{RefreshSessionRow, ResolveSessionRow, SessionId};
use crate::models::user::{UserCredentials, UserId, UserResponse};

impl DbConnection {
    /// Resolve a bearer access token into the calling user, rejecting
    /// unknown sessions and expired tokens uniformly
    pub async fn resolve_session(
        &self,
        session_id: &SessionId,
        access_token: &[u8],
    ) -> Result<UserId, SessionError> {
        let row = get_session_for_access(self.pool(), session_id)
            .await
            .map_err(|e| match e {
                SqlxError::RowNotFound => SessionError::TokenNotFound,
                e => {
                    error!("failed to resolve session: {e}");
                    SessionError::Internal
                }
            })?;
        if !digests_match(&token_digest(access_token), &row.access_token_sha) {
            return Err(SessionError::TokenNotFound);
        }
        if row.access_token_expires_at < Utc::now() {
            return Err(SessionError::TokenExpired);
        }
        Ok(row.user_id)
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<UserResponse, RequestError> {
        Ok(get_user_by_id(self.pool(), user_id).await?)
    }

    /// Pages of the owner, favorites first then by name, each with its
    /// resources in ascending rank
    pub async fn list_pages_with_resources(
        &self,
        owner: UserId,
    ) -> Result<Vec<PageWithResources>, RequestError> {
        let pages = list_pages_for_owner(self.pool(), owner).await?;
        let resources = list_resources_for_owner(self.pool(), owner, None).await?;

        let mut grouped: HashMap<PageId, Vec<ResourceResponse>> = HashMap::new();
        for resource in resources {
            grouped.entry(resource.page_id).or_default().push(resource);
        }
        Ok(pages
            .into_iter()
            .map(|page| {
                let resources = grouped.remove(&page.id).unwrap_or_default();
                PageWithResources { page, resources }
            })
            .collect())
    }

    pub async fn get_page_with_resources(
        &self,
        owner: UserId,
        page_id: PageId,
    ) -> Result<PageWithResources, RequestError> {
        let page = map_not_found_as_none(get_page_for_owner(self.pool(), owner, page_id).await)?
            .ok_or(RequestError::NotFound)?;
        let resources = list_resources_for_owner(self.pool(), owner, Some(page_id)).await?;
        Ok(PageWithResources { page, resources })
    }

    pub async fn list_resources(
        &self,
        owner: UserId,
        page_id: Option<PageId>,
    ) -> Result<Vec<ResourceResponse>, RequestError> {
        Ok(list_resources_for_owner(self.pool(), owner, page_id).await?)
    }

    pub async fn get_resource(
        &self,
        owner: UserId,
        resource_id: ResourceId,
    ) -> Result<ResourceResponse, RequestError> {
        map_not_found_as_none(get_resource_for_owner(self.pool(), owner, resource_id).await)?
            .ok_or(RequestError::NotFound)
    }

    /// True iff an owned resource row records exactly this relative file
    /// path, gates the download endpoint
    pub async fn resource_file_registered(
        &self,
        owner: UserId,
        path: &str,
    ) -> Result<bool, RequestError> {
        Ok(file_path_registered(self.pool(), owner, path).await?)
    }
}

#[instrument(skip(executor))]
pub async fn get_user_by_id<'a, E: PgExecutor<'a>>(
    executor: E,
    user_id: UserId,
) -> Result<UserResponse, SqlxError> {
    sqlx::query_as("SELECT id, email, created_at FROM users WHERE id = $1;")
        .bind(user_id)
        .fetch_one(executor)
        .await
}

#[instrument(skip(executor, email))]
pub async fn get_user_credentials_by_email<'a, E: PgExecutor<'a>>(
    executor: E,
    email: &str,
) -> Result<UserCredentials, SqlxError> {
    sqlx::query_as("SELECT id, password_hash FROM users WHERE email = $1;")
        .bind(email)
        .fetch_one(executor)
        .await
}

#[instrument(skip(executor))]
pub async fn get_session_for_access<'a, E: PgExecutor<'a>>(
    executor: E,
    session_id: &SessionId,
) -> Result<ResolveSessionRow, SqlxError> {
    sqlx::query_as(
        "SELECT user_id, access_token_sha, access_token_expires_at FROM sessions WHERE id = $1;",
    )
    .bind(session_id)
    .fetch_one(executor)
    .await
}

#[instrument(skip(executor))]
pub async fn get_session_for_refresh<'a, E: PgExecutor<'a>>(
    executor: E,
    session_id: &SessionId,
) -> Result<RefreshSessionRow, SqlxError> {
    sqlx::query_as(
        "SELECT user_id, refresh_token_sha, refresh_token_expires_at FROM sessions WHERE id = $1;",
    )
    .bind(session_id)
    .fetch_one(executor)
    .await
}

#[instrument(skip(executor))]
pub async fn list_pages_for_owner<'a, E: PgExecutor<'a>>(
    executor: E,
    owner: UserId,
) -> Result<Vec<PageResponse>, SqlxError> {
    sqlx::query_as(
        "
    SELECT
        id, user_id, name, type, is_favorite, created_at
    FROM
        pages
    WHERE
        user_id = $1
    ORDER BY
        is_favorite DESC, name ASC;
    ",
    )
    .bind(owner)
    .fetch_all(executor)
    .await
}

#[instrument(skip(executor))]
pub async fn get_page_for_owner<'a, E: PgExecutor<'a>>(
    executor: E,
    owner: UserId,
    page_id: PageId,
) -> Result<PageResponse, SqlxError> {
    sqlx::query_as(
        "
    SELECT
        id, user_id, name, type, is_favorite, created_at
    FROM
        pages
    WHERE
        user_id = $1 AND id = $2;
    ",
    )
    .bind(owner)
    .bind(page_id)
    .fetch_one(executor)
    .await
}

#[instrument(skip(executor))]
pub async fn list_resources_for_owner<'a, E: PgExecutor<'a>>(
    executor: E,
    owner: UserId,
    page_id: Option<PageId>,
) -> Result<Vec<ResourceResponse>, SqlxError> {
    sqlx::query_as(
        "
    SELECT
        r.id, r.page_id, r.title, r.description, r.resource_type,
        r.file_path, r.external_url, r.display_order, r.is_expanded, r.created_at
    FROM
        resources r JOIN pages p ON r.page_id = p.id
    WHERE
        p.user_id = $1 AND ($2::int IS NULL OR r.page_id = $2)
    ORDER BY
        r.page_id, r.display_order, r.id;
    ",
    )
    .bind(owner)
    .bind(page_id)
    .fetch_all(executor)
    .await
}

#[instrument(skip(executor))]
pub async fn get_resource_for_owner<'a, E: PgExecutor<'a>>(
    executor: E,
    owner: UserId,
    resource_id: ResourceId,
) -> Result<ResourceResponse, SqlxError> {
    sqlx::query_as(
        "
    SELECT
        r.id, r.page_id, r.title, r.description, r.resource_type,
        r.file_path, r.external_url, r.display_order, r.is_expanded, r.created_at
    FROM
        resources r JOIN pages p ON r.page_id = p.id
    WHERE
        p.user_id = $1 AND r.id = $2;
    ",
    )
    .bind(owner)
    .bind(resource_id)
    .fetch_one(executor)
    .await
}

#[instrument(skip(executor))]
pub async fn file_path_registered<'a, E: PgExecutor<'a>>(
    executor: E,
    owner: UserId,
    path: &str,
) -> Result<bool, SqlxError> {
    sqlx::query_scalar(
        "
    SELECT EXISTS (
        SELECT 1
        FROM resources r JOIN pages p ON r.page_id = p.id
        WHERE p.user_id = $1 AND r.file_path = $2
    );
    ",
    )
    .bind(owner)
    .bind(path)
    .fetch_one(executor)
    .await
}
