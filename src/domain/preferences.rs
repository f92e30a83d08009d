//! Parent preference rows
//!
//! One row per parent, saved as a whole on every write. There is no
//! partial-field merge: the UI submits the complete preference set and the
//! upsert overwrites all columns.

use sqlx::PgPool;

use crate::models::EducationalPriority;

#[derive(Debug, Clone)]
pub struct Preferences {
    pub allowed_topics: Vec<String>,
    pub blocked_topics: Vec<String>,
    pub allow_mild_language: bool,
    pub educational_priority: EducationalPriority,
}

pub async fn get_preferences(
    db: &PgPool,
    parent_id: i64,
) -> Result<Option<Preferences>, sqlx::Error> {
    let row: Option<(Vec<String>, Vec<String>, bool, String)> = sqlx::query_as(
        r#"
        SELECT allowed_topics, blocked_topics, allow_mild_language, educational_priority
        FROM parent_preferences
        WHERE parent_id = $1
        "#,
    )
    .bind(parent_id)
    .fetch_optional(db)
    .await?;

    Ok(row.map(
        |(allowed_topics, blocked_topics, allow_mild_language, priority)| Preferences {
            allowed_topics,
            blocked_topics,
            allow_mild_language,
            educational_priority: EducationalPriority::parse(&priority)
                .unwrap_or(EducationalPriority::High),
        },
    ))
}

/// Create or overwrite the parent's preference row as a whole
pub async fn upsert_preferences(
    db: &PgPool,
    parent_id: i64,
    preferences: &Preferences,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO parent_preferences
            (parent_id, allowed_topics, blocked_topics, allow_mild_language, educational_priority)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (parent_id) DO UPDATE SET
            allowed_topics = $2,
            blocked_topics = $3,
            allow_mild_language = $4,
            educational_priority = $5,
            updated_at = NOW()
        "#,
    )
    .bind(parent_id)
    .bind(&preferences.allowed_topics)
    .bind(&preferences.blocked_topics)
    .bind(preferences.allow_mild_language)
    .bind(preferences.educational_priority.as_str())
    .execute(db)
    .await?;
    Ok(())
}
