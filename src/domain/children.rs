//! Child profile rows, including the per-child YouTube connection fields
//!
//! All reads are scoped by (child_id, parent_id) so a parent can never see
//! or mutate another parent's children. Deleting a child cascades its
//! videos at the schema level.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct Child {
    pub id: i64,
    pub parent_id: i64,
    pub name: String,
    pub age: i32,
    pub youtube_channel_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing row: the token itself never leaves the database layer, only
/// whether a connection exists.
#[derive(Debug, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSummary {
    pub id: i64,
    pub name: String,
    pub age: i32,
    pub youtube_channel_id: Option<String>,
    pub youtube_connected: bool,
}

/// The stored OAuth token triple for one child
#[derive(Debug, sqlx::FromRow)]
pub struct ChildTokens {
    pub youtube_access_token: Option<String>,
    pub youtube_refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

pub async fn insert_child(
    db: &PgPool,
    parent_id: i64,
    name: &str,
    age: i32,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO children (parent_id, name, age)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(parent_id)
    .bind(name)
    .bind(age)
    .fetch_one(db)
    .await?;

    Ok(row.0)
}

pub async fn list_children(db: &PgPool, parent_id: i64) -> Result<Vec<ChildSummary>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, name, age, youtube_channel_id,
               youtube_access_token IS NOT NULL AS youtube_connected
        FROM children
        WHERE parent_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(parent_id)
    .fetch_all(db)
    .await
}

/// Fetch a child, verifying it belongs to the given parent
pub async fn get_child(
    db: &PgPool,
    child_id: i64,
    parent_id: i64,
) -> Result<Option<Child>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, parent_id, name, age, youtube_channel_id, created_at
        FROM children
        WHERE id = $1 AND parent_id = $2
        "#,
    )
    .bind(child_id)
    .bind(parent_id)
    .fetch_optional(db)
    .await
}

pub async fn delete_child(db: &PgPool, child_id: i64, parent_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM children WHERE id = $1 AND parent_id = $2
        "#,
    )
    .bind(child_id)
    .bind(parent_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}

pub async fn get_tokens(db: &PgPool, child_id: i64) -> Result<Option<ChildTokens>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT youtube_access_token, youtube_refresh_token, token_expires_at
        FROM children
        WHERE id = $1
        "#,
    )
    .bind(child_id)
    .fetch_optional(db)
    .await
}

/// Persist a refreshed access token and its new expiry
pub async fn update_access_token(
    db: &PgPool,
    child_id: i64,
    access_token: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE children
        SET youtube_access_token = $2, token_expires_at = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(child_id)
    .bind(access_token)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Record a completed OAuth connection on the child
pub async fn set_connection(
    db: &PgPool,
    child_id: i64,
    channel_id: &str,
    access_token: &str,
    refresh_token: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE children
        SET youtube_channel_id = $2,
            youtube_access_token = $3,
            youtube_refresh_token = $4,
            token_expires_at = $5,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(child_id)
    .bind(channel_id)
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Null out all four connection fields (disconnect)
pub async fn clear_connection(db: &PgPool, child_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE children
        SET youtube_channel_id = NULL,
            youtube_access_token = NULL,
            youtube_refresh_token = NULL,
            token_expires_at = NULL,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(child_id)
    .execute(db)
    .await?;
    Ok(())
}
