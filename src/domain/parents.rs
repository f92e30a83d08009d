//! Parent account rows

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct Parent {
    pub id: i64,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ParentCredentials {
    pub id: i64,
    pub password_hash: String,
}

pub async fn insert_parent(
    db: &PgPool,
    email: &str,
    password_hash: &str,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO parents (email, password_hash)
        VALUES ($1, $2)
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .fetch_one(db)
    .await?;

    Ok(row.0)
}

pub async fn get_credentials_by_email(
    db: &PgPool,
    email: &str,
) -> Result<Option<ParentCredentials>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, password_hash FROM parents WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await
}

pub async fn get_parent_by_id(db: &PgPool, parent_id: i64) -> Result<Option<Parent>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, email, created_at FROM parents WHERE id = $1
        "#,
    )
    .bind(parent_id)
    .fetch_optional(db)
    .await
}

/// True when the error is a Postgres unique-constraint violation
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
