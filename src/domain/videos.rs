//! Video rows and the classification result block
//!
//! The dedup key is (child_id, youtube_video_id), enforced by a unique
//! constraint in addition to the pre-insert existence check. Classification
//! fields are written all at once by `save_analysis`, so a row is always
//! either fully unanalyzed (all nulls) or fully analyzed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::models::{Decision, Verdict};

#[derive(Debug, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRow {
    pub id: i64,
    pub child_id: i64,
    pub youtube_video_id: String,
    pub title: String,
    pub channel_name: String,
    pub channel_id: String,
    pub description: String,
    pub thumbnail_url: String,
    pub duration_secs: i32,
    pub watched_at: DateTime<Utc>,
    pub has_transcript: bool,
    pub transcript_fetch_failed: bool,
    pub ai_decision: Option<String>,
    pub ai_confidence: Option<i32>,
    pub ai_category: Option<String>,
    pub educational_value: Option<i32>,
    pub concerns: Option<Vec<String>>,
    pub ai_reasoning: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

/// Fields for a freshly ingested, unanalyzed video
#[derive(Debug)]
pub struct NewVideo<'a> {
    pub child_id: i64,
    pub youtube_video_id: &'a str,
    pub title: &'a str,
    pub channel_name: &'a str,
    pub channel_id: &'a str,
    pub description: &'a str,
    pub thumbnail_url: &'a str,
    pub duration_secs: i32,
    pub watched_at: DateTime<Utc>,
    pub has_transcript: bool,
    pub transcript_fetch_failed: bool,
}

const VIDEO_COLUMNS: &str = r#"
    id, child_id, youtube_video_id, title, channel_name, channel_id,
    description, thumbnail_url, duration_secs, watched_at,
    has_transcript, transcript_fetch_failed,
    ai_decision, ai_confidence, ai_category, educational_value,
    concerns, ai_reasoning, analyzed_at
"#;

/// Dedup check: does this child already have a row for this video id?
pub async fn exists(db: &PgPool, child_id: i64, youtube_video_id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT id FROM videos WHERE child_id = $1 AND youtube_video_id = $2
        "#,
    )
    .bind(child_id)
    .bind(youtube_video_id)
    .fetch_optional(db)
    .await?;

    Ok(row.is_some())
}

/// Insert a new video with all classification fields null
pub async fn insert_unanalyzed(db: &PgPool, video: &NewVideo<'_>) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO videos
            (child_id, youtube_video_id, title, channel_name, channel_id,
             description, thumbnail_url, duration_secs, watched_at,
             has_transcript, transcript_fetch_failed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(video.child_id)
    .bind(video.youtube_video_id)
    .bind(video.title)
    .bind(video.channel_name)
    .bind(video.channel_id)
    .bind(video.description)
    .bind(video.thumbnail_url)
    .bind(video.duration_secs)
    .bind(video.watched_at)
    .bind(video.has_transcript)
    .bind(video.transcript_fetch_failed)
    .fetch_one(db)
    .await?;

    Ok(row.0)
}

/// Videos for one child that have never been analyzed, oldest watch first
pub async fn list_unanalyzed(
    db: &PgPool,
    child_id: i64,
    limit: i64,
) -> Result<Vec<VideoRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        r#"
        SELECT {} FROM videos
        WHERE child_id = $1 AND ai_decision IS NULL
        ORDER BY watched_at ASC
        LIMIT $2
        "#,
        VIDEO_COLUMNS
    ))
    .bind(child_id)
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn list_for_child(db: &PgPool, child_id: i64) -> Result<Vec<VideoRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        r#"
        SELECT {} FROM videos
        WHERE child_id = $1
        ORDER BY watched_at DESC
        "#,
        VIDEO_COLUMNS
    ))
    .bind(child_id)
    .fetch_all(db)
    .await
}

/// Persist the result of a transcript attempt. `transcript_fetch_failed`
/// only ever moves false -> true, so a failed video is never retried.
pub async fn update_transcript_flags(
    db: &PgPool,
    video_id: i64,
    has_transcript: bool,
    fetch_failed: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE videos
        SET has_transcript = $2,
            transcript_fetch_failed = transcript_fetch_failed OR $3
        WHERE id = $1
        "#,
    )
    .bind(video_id)
    .bind(has_transcript)
    .bind(fetch_failed)
    .execute(db)
    .await?;
    Ok(())
}

/// Persist a verdict: all classification fields in one UPDATE, stamped now
pub async fn save_analysis(db: &PgPool, video_id: i64, verdict: &Verdict) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE videos
        SET ai_decision = $2,
            ai_confidence = $3,
            ai_category = $4,
            educational_value = $5,
            concerns = $6,
            ai_reasoning = $7,
            analyzed_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(video_id)
    .bind(verdict.decision.as_str())
    .bind(verdict.confidence)
    .bind(&verdict.category)
    .bind(verdict.educational_value)
    .bind(&verdict.concerns)
    .bind(&verdict.reasoning)
    .execute(db)
    .await?;
    Ok(())
}

/// Parent override of a decision. The child join enforces ownership;
/// returns the number of rows updated (0 = not found / not owned).
pub async fn set_decision_for_parent(
    db: &PgPool,
    video_id: i64,
    parent_id: i64,
    decision: Decision,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE videos
        SET ai_decision = $3
        FROM children
        WHERE videos.id = $1
          AND videos.child_id = children.id
          AND children.parent_id = $2
        "#,
    )
    .bind(video_id)
    .bind(parent_id)
    .bind(decision.as_str())
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}
