use chrono::Utc;
use ipnetwork::IpNetwork;
use sqlx::{Error as SqlxError, PgExecutor};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::token::TokenExchangePayload;
use crate::auth::utils::{
    digests_match, generate_token, hash_password, token_digest, verify_password,
};
use crate::config::AuthConfig;
use crate::database::connection::DbConnection;
use crate::database::queries::{get_session_for_refresh, get_user_credentials_by_email};
use crate::database::utils::map_not_found_as_none;
use crate::error::{RequestError, ValidationError};
use crate::models::page::{
    validate_page_name, CreatePageRequest, PageId, PageResponse, PageUpdate,
};
use crate::models::resource::{
    validate_content_source, validate_description, validate_reorder_batch,
    validate_resource_title, CreateResourceRequest, ReorderBatch, ResourceId, ResourceResponse,
    ResourceUpdate,
};
use crate::models::session::{NewSession, RotateTokensRequest, SessionId};
use crate::models::user::{
    validate_user_email, validate_user_password, UserId, UserResponse,
};

fn is_unique_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(db) if db.is_unique_violation())
}

impl DbConnection {
    #[instrument(skip_all)]
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserResponse, RequestError> {
        validate_user_email(email)?;
        validate_user_password(password)?;
        let password_hash = hash_password(password)?;
        let user = create_user(self.pool(), email, &password_hash)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RequestError::Validation(ValidationError::AlreadyExists)
                } else {
                    e.into()
                }
            })?;
        info!("registered user with id: {}", user.id);
        Ok(user)
    }

    #[instrument(skip_all)]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip: IpNetwork,
        auth: &AuthConfig,
    ) -> Result<TokenExchangePayload, RequestError> {
        let credentials = get_user_credentials_by_email(self.pool(), email)
            .await
            .map_err(|e| match e {
                SqlxError::RowNotFound => RequestError::BadCredentials,
                e => e.into(),
            })?;
        if !verify_password(password, &credentials.password_hash) {
            return Err(RequestError::BadCredentials);
        }

        let now = Utc::now();
        let refresh_token = generate_token();
        let access_token = generate_token();
        let session = NewSession {
            id: Uuid::new_v4(),
            user_id: credentials.id,
            ip,
            refresh_token_sha: token_digest(&refresh_token),
            refresh_token_expires_at: now + auth.refresh_token_ttl(),
            access_token_sha: token_digest(&access_token),
            access_token_expires_at: now + auth.access_token_ttl(),
        };
        insert_session(self.pool(), &session).await?;
        Ok(TokenExchangePayload::new(
            &session.id,
            refresh_token,
            session.refresh_token_expires_at,
            access_token,
            session.access_token_expires_at,
        ))
    }

    /// Exchange a valid refresh token for a fresh token pair, both tokens
    /// rotate
    #[instrument(skip_all)]
    pub async fn refresh_session(
        &self,
        session_id: &SessionId,
        refresh_token: &[u8],
        auth: &AuthConfig,
    ) -> Result<TokenExchangePayload, RequestError> {
        let row = get_session_for_refresh(self.pool(), session_id)
            .await
            .map_err(|e| match e {
                SqlxError::RowNotFound => RequestError::BadCredentials,
                e => e.into(),
            })?;
        if !digests_match(&token_digest(refresh_token), &row.refresh_token_sha) {
            return Err(RequestError::BadCredentials);
        }
        if row.refresh_token_expires_at < Utc::now() {
            return Err(RequestError::Expired);
        }

        let now = Utc::now();
        let new_refresh = generate_token();
        let new_access = generate_token();
        let rotation = RotateTokensRequest {
            session_id: *session_id,
            refresh_token_sha: token_digest(&new_refresh),
            refresh_token_expires_at: now + auth.refresh_token_ttl(),
            access_token_sha: token_digest(&new_access),
            access_token_expires_at: now + auth.access_token_ttl(),
        };
        rotate_session_tokens(self.pool(), &rotation).await?;
        Ok(TokenExchangePayload::new(
            session_id,
            new_refresh,
            rotation.refresh_token_expires_at,
            new_access,
            rotation.access_token_expires_at,
        ))
    }

    pub async fn logout(&self, session_id: &SessionId) -> Result<(), RequestError> {
        delete_session(self.pool(), session_id).await?;
        Ok(())
    }

    pub async fn create_page(
        &self,
        owner: UserId,
        request: &CreatePageRequest,
    ) -> Result<PageResponse, RequestError> {
        validate_page_name(&request.name)?;
        Ok(insert_page(self.pool(), owner, request).await?)
    }

    pub async fn update_page(
        &self,
        owner: UserId,
        page_id: PageId,
        update: &PageUpdate,
    ) -> Result<PageResponse, RequestError> {
        if let Some(name) = update.name.as_deref() {
            validate_page_name(name)?;
        }
        let updated = sqlx::query_as(
            "
        UPDATE pages SET
            name = COALESCE($3, name),
            type = COALESCE($4, type),
            is_favorite = COALESCE($5, is_favorite)
        WHERE
            user_id = $1 AND id = $2
        RETURNING
            id, user_id, name, type, is_favorite, created_at;
        ",
        )
        .bind(owner)
        .bind(page_id)
        .bind(update.name.as_deref())
        .bind(update.page_type)
        .bind(update.is_favorite)
        .fetch_optional(self.pool())
        .await?;
        updated.ok_or(RequestError::NotFound)
    }

    /// Cascades to the page's resources, returns the orphaned file paths so
    /// the caller can unlink them from storage
    #[instrument(skip(self))]
    pub async fn delete_page(
        &self,
        owner: UserId,
        page_id: PageId,
    ) -> Result<Vec<String>, RequestError> {
        let mut tx = self.pool().begin().await?;
        let owned: Option<PageId> =
            sqlx::query_scalar("SELECT id FROM pages WHERE user_id = $1 AND id = $2 FOR UPDATE;")
                .bind(owner)
                .bind(page_id)
                .fetch_optional(tx.as_mut())
                .await?;
        if owned.is_none() {
            return Err(RequestError::NotFound);
        }
        let file_paths: Vec<String> = sqlx::query_scalar(
            "SELECT file_path FROM resources WHERE page_id = $1 AND file_path IS NOT NULL;",
        )
        .bind(page_id)
        .fetch_all(tx.as_mut())
        .await?;
        sqlx::query("DELETE FROM pages WHERE id = $1;")
            .bind(page_id)
            .execute(tx.as_mut())
            .await?;
        tx.commit().await?;
        info!("deleted page {page_id} with {} stored files", file_paths.len());
        Ok(file_paths)
    }

    /// New resources append at rank = current count, keeping ranks dense
    pub async fn create_resource(
        &self,
        owner: UserId,
        request: &CreateResourceRequest,
    ) -> Result<ResourceResponse, RequestError> {
        validate_resource_title(&request.title)?;
        if let Some(description) = request.description.as_deref() {
            validate_description(description)?;
        }
        validate_content_source(
            request.file_path.as_deref(),
            request.external_url.as_deref(),
        )?;

        let mut tx = self.pool().begin().await?;
        let owned: Option<PageId> =
            sqlx::query_scalar("SELECT id FROM pages WHERE user_id = $1 AND id = $2 FOR UPDATE;")
                .bind(owner)
                .bind(request.page_id)
                .fetch_optional(tx.as_mut())
                .await?;
        if owned.is_none() {
            return Err(RequestError::NotFound);
        }
        let rank: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resources WHERE page_id = $1;")
            .bind(request.page_id)
            .fetch_one(tx.as_mut())
            .await?;
        let created: ResourceResponse = sqlx::query_as(
            "
        INSERT INTO resources
            (page_id, title, description, resource_type, file_path, external_url,
             display_order, is_expanded)
        VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING
            id, page_id, title, description, resource_type, file_path, external_url,
            display_order, is_expanded, created_at;
        ",
        )
        .bind(request.page_id)
        .bind(&request.title)
        .bind(request.description.as_deref())
        .bind(request.resource_type)
        .bind(request.file_path.as_deref())
        .bind(request.external_url.as_deref())
        .bind(rank as i32)
        .bind(request.is_expanded)
        .fetch_one(tx.as_mut())
        .await?;
        tx.commit().await?;
        Ok(created)
    }

    pub async fn update_resource(
        &self,
        owner: UserId,
        resource_id: ResourceId,
        update: &ResourceUpdate,
    ) -> Result<ResourceResponse, RequestError> {
        if let Some(title) = update.title.as_deref() {
            validate_resource_title(title)?;
        }
        if let Some(description) = update.description.as_deref() {
            validate_description(description)?;
        }

        let mut tx = self.pool().begin().await?;
        let current = map_not_found_as_none(
            sqlx::query_as::<_, ResourceResponse>(
                "
            SELECT
                r.id, r.page_id, r.title, r.description, r.resource_type,
                r.file_path, r.external_url, r.display_order, r.is_expanded, r.created_at
            FROM
                resources r JOIN pages p ON r.page_id = p.id
            WHERE
                p.user_id = $1 AND r.id = $2
            FOR UPDATE OF r;
            ",
            )
            .bind(owner)
            .bind(resource_id)
            .fetch_one(tx.as_mut())
            .await,
        )?
        .ok_or(RequestError::NotFound)?;

        let file_path = update.file_path.clone().or(current.file_path);
        let external_url = update.external_url.clone().or(current.external_url);
        validate_content_source(file_path.as_deref(), external_url.as_deref())?;

        let updated: ResourceResponse = sqlx::query_as(
            "
        UPDATE resources SET
            title = $2,
            description = $3,
            resource_type = $4,
            file_path = $5,
            external_url = $6,
            display_order = $7,
            is_expanded = $8
        WHERE
            id = $1
        RETURNING
            id, page_id, title, description, resource_type, file_path, external_url,
            display_order, is_expanded, created_at;
        ",
        )
        .bind(resource_id)
        .bind(update.title.as_deref().unwrap_or(&current.title))
        .bind(update.description.as_deref().or(current.description.as_deref()))
        .bind(update.resource_type.unwrap_or(current.resource_type))
        .bind(file_path.as_deref())
        .bind(external_url.as_deref())
        .bind(update.display_order.unwrap_or(current.display_order))
        .bind(update.is_expanded.unwrap_or(current.is_expanded))
        .fetch_one(tx.as_mut())
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Apply a reorder batch atomically. The batch must cover exactly the
    /// page's resources with ranks forming a permutation of 0..n, anything
    /// else is rejected before any row is touched.
    #[instrument(skip(self, batch))]
    pub async fn reorder_resources(
        &self,
        owner: UserId,
        batch: &ReorderBatch,
    ) -> Result<Vec<ResourceResponse>, RequestError> {
        if batch.is_empty() {
            return Err(ValidationError::InvalidInput {
                value: "{}".to_string(),
                reason: "reorder batch cannot be empty".to_string(),
            }
            .into());
        }
        let batch_ids: Vec<ResourceId> = batch.keys().copied().collect();

        let mut tx = self.pool().begin().await?;
        let found: Vec<(ResourceId, PageId)> = sqlx::query_as(
            "
        SELECT r.id, r.page_id
        FROM resources r JOIN pages p ON r.page_id = p.id
        WHERE p.user_id = $1 AND r.id = ANY($2);
        ",
        )
        .bind(owner)
        .bind(&batch_ids)
        .fetch_all(tx.as_mut())
        .await?;
        if found.len() != batch.len() {
            return Err(RequestError::NotFound);
        }
        let page_id = found[0].1;
        if found.iter().any(|(_, pid)| *pid != page_id) {
            return Err(ValidationError::InvalidInput {
                value: "resource ids".to_string(),
                reason: "reorder batch must target a single page".to_string(),
            }
            .into());
        }

        let current_ids: Vec<ResourceId> =
            sqlx::query_scalar("SELECT id FROM resources WHERE page_id = $1 FOR UPDATE;")
                .bind(page_id)
                .fetch_all(tx.as_mut())
                .await?;
        validate_reorder_batch(&current_ids, batch)?;

        for (resource_id, rank) in batch {
            sqlx::query("UPDATE resources SET display_order = $2 WHERE id = $1;")
                .bind(resource_id)
                .bind(rank)
                .execute(tx.as_mut())
                .await?;
        }
        let reordered = sqlx::query_as(
            "
        SELECT
            r.id, r.page_id, r.title, r.description, r.resource_type,
            r.file_path, r.external_url, r.display_order, r.is_expanded, r.created_at
        FROM
            resources r
        WHERE
            r.page_id = $1
        ORDER BY
            r.display_order;
        ",
        )
        .bind(page_id)
        .fetch_all(tx.as_mut())
        .await?;
        tx.commit().await?;
        Ok(reordered)
    }

    /// Removes the row, re-compacts the survivors to dense ranks and
    /// returns the stored file path, if any, for unlinking
    #[instrument(skip(self))]
    pub async fn delete_resource(
        &self,
        owner: UserId,
        resource_id: ResourceId,
    ) -> Result<Option<String>, RequestError> {
        let mut tx = self.pool().begin().await?;
        let target: Option<(PageId, i32, Option<String>)> = sqlx::query_as(
            "
        SELECT r.page_id, r.display_order, r.file_path
        FROM resources r JOIN pages p ON r.page_id = p.id
        WHERE p.user_id = $1 AND r.id = $2
        FOR UPDATE OF r;
        ",
        )
        .bind(owner)
        .bind(resource_id)
        .fetch_optional(tx.as_mut())
        .await?;
        let Some((page_id, rank, file_path)) = target else {
            return Err(RequestError::NotFound);
        };
        sqlx::query("DELETE FROM resources WHERE id = $1;")
            .bind(resource_id)
            .execute(tx.as_mut())
            .await?;
        sqlx::query(
            "UPDATE resources SET display_order = display_order - 1
             WHERE page_id = $1 AND display_order > $2;",
        )
        .bind(page_id)
        .bind(rank)
        .execute(tx.as_mut())
        .await?;
        tx.commit().await?;
        Ok(file_path)
    }
}

#[instrument(skip_all)]
pub async fn create_user<'a, E: PgExecutor<'a>>(
    executor: E,
    email: &str,
    password_hash: &str,
) -> Result<UserResponse, SqlxError> {
    sqlx::query_as(
        "
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, created_at;
        ",
    )
    .bind(email)
    .bind(password_hash)
    .fetch_one(executor)
    .await
}

#[instrument(skip_all)]
pub async fn insert_session<'a, E: PgExecutor<'a>>(
    executor: E,
    session: &NewSession,
) -> Result<(), SqlxError> {
    sqlx::query(
        "
            INSERT INTO sessions
                (id, user_id, ip, refresh_token_sha, refresh_token_expires_at,
                 access_token_sha, access_token_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7);
        ",
    )
    .bind(session.id)
    .bind(session.user_id)
    .bind(session.ip)
    .bind(&session.refresh_token_sha)
    .bind(session.refresh_token_expires_at)
    .bind(&session.access_token_sha)
    .bind(session.access_token_expires_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn rotate_session_tokens<'a, E: PgExecutor<'a>>(
    executor: E,
    rotation: &RotateTokensRequest,
) -> Result<(), SqlxError> {
    sqlx::query(
        "
            UPDATE sessions SET
                refresh_token_sha = $2,
                refresh_token_expires_at = $3,
                access_token_sha = $4,
                access_token_expires_at = $5,
                last_seen_at = current_timestamp
            WHERE id = $1;
        ",
    )
    .bind(rotation.session_id)
    .bind(&rotation.refresh_token_sha)
    .bind(rotation.refresh_token_expires_at)
    .bind(&rotation.access_token_sha)
    .bind(rotation.access_token_expires_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[instrument(skip(executor))]
pub async fn delete_session<'a, E: PgExecutor<'a>>(
    executor: E,
    session_id: &SessionId,
) -> Result<(), SqlxError> {
    sqlx::query("DELETE FROM sessions WHERE id = $1;")
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(())
}

#[instrument(skip(executor, request))]
pub async fn insert_page<'a, E: PgExecutor<'a>>(
    executor: E,
    owner: UserId,
    request: &CreatePageRequest,
) -> Result<PageResponse, SqlxError> {
    sqlx::query_as(
        "
            INSERT INTO pages (user_id, name, type, is_favorite)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, type, is_favorite, created_at;
        ",
    )
    .bind(owner)
    .bind(&request.name)
    .bind(request.page_type)
    .bind(request.is_favorite)
    .fetch_one(executor)
    .await
}
