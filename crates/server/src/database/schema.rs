use sqlx::{Error as SqlxError, Postgres, Transaction};
use tracing::instrument;

use crate::database::connection::DbConnection;

impl DbConnection {
    pub async fn init_schema(&self) -> Result<(), SqlxError> {
        let mut transaction = self.pool().begin().await?;
        create_all_types(&mut transaction).await?;
        create_all_tables(&mut transaction).await?;
        transaction.commit().await?;
        Ok(())
    }
    pub async fn drop_schema(&self) -> Result<(), SqlxError> {
        let mut transaction = self.pool().begin().await?;
        drop_all_tables(&mut transaction).await?;
        drop_all_types(&mut transaction).await?;
        transaction.commit().await?;
        Ok(())
    }
}

#[instrument(skip_all)]
pub async fn create_all_types(
    transaction: &mut Transaction<'_, Postgres>,
) -> Result<(), SqlxError> {
    sqlx::query("CREATE TYPE page_type AS ENUM ('song', 'technical');")
        .execute(transaction.as_mut())
        .await?;
    sqlx::query(
        "CREATE TYPE resource_type AS ENUM ('video', 'photo', 'document', 'music_sheet', 'audio');",
    )
    .execute(transaction.as_mut())
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn drop_all_types(transaction: &mut Transaction<'_, Postgres>) -> Result<(), SqlxError> {
    let statements = [
        "DROP TYPE IF EXISTS resource_type;",
        "DROP TYPE IF EXISTS page_type;",
    ];
    for statement in &statements {
        sqlx::query(statement).execute(transaction.as_mut()).await?;
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn create_all_tables(
    transaction: &mut Transaction<'_, Postgres>,
) -> Result<(), SqlxError> {
    sqlx::query(
        "
            CREATE TABLE users (
                id              int PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
                email           VARCHAR(254) NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
            );
        ",
    )
    .execute(transaction.as_mut())
    .await?;
    sqlx::query(
        "
            CREATE TABLE sessions (
                id                          uuid PRIMARY KEY,
                user_id                     int NOT NULL REFERENCES users(id) ON UPDATE CASCADE ON DELETE CASCADE,
                ip                          INET NOT NULL,
                created_at                  TIMESTAMPTZ NOT NULL DEFAULT now(),
                last_seen_at                TIMESTAMPTZ NOT NULL DEFAULT now(),
                refresh_token_sha           BYTEA NOT NULL,
                refresh_token_expires_at    TIMESTAMPTZ NOT NULL,
                access_token_sha            BYTEA NOT NULL,
                access_token_expires_at     TIMESTAMPTZ NOT NULL
            );
        ",
    )
    .execute(transaction.as_mut())
    .await?;
    sqlx::query(
        "
            CREATE TABLE pages (
                id           int PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
                user_id      int NOT NULL REFERENCES users(id) ON UPDATE CASCADE ON DELETE CASCADE,
                name         VARCHAR(200) NOT NULL,
                type         page_type NOT NULL,
                is_favorite  BOOLEAN NOT NULL DEFAULT FALSE,
                created_at   TIMESTAMPTZ NOT NULL DEFAULT now()
            );
        ",
    )
    .execute(transaction.as_mut())
    .await?;
    sqlx::query(
        "
            CREATE TABLE resources (
                id             bigint PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
                page_id        int NOT NULL REFERENCES pages(id) ON UPDATE CASCADE ON DELETE CASCADE,
                title          VARCHAR(200) NOT NULL,
                description    VARCHAR(10000),
                resource_type  resource_type NOT NULL,
                file_path      VARCHAR(512),
                external_url   VARCHAR(2048),
                display_order  INTEGER NOT NULL,
                is_expanded    BOOLEAN NOT NULL DEFAULT TRUE,
                created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
                CONSTRAINT resource_one_source CHECK ((file_path IS NULL) <> (external_url IS NULL))
            );
        ",
    )
    .execute(transaction.as_mut())
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn drop_all_tables(transaction: &mut Transaction<'_, Postgres>) -> Result<(), SqlxError> {
    let statements = [
        "DROP TABLE IF EXISTS resources;",
        "DROP TABLE IF EXISTS pages;",
        "DROP TABLE IF EXISTS sessions;",
        "DROP TABLE IF EXISTS users;",
    ];
    for statement in &statements {
        sqlx::query(statement).execute(transaction.as_mut()).await?;
    }
    Ok(())
}
