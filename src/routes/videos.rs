//! Video scan, analysis, listing, and decision endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;
use crate::constants::{DEFAULT_ANALYZE_LIMIT, YOUTUBE_PAGE_SIZE};
use crate::domain::children::{self, Child};
use crate::domain::{preferences, videos};
use crate::models::Decision;
use crate::pipeline::{self, AnalyzeSummary, ScanError, ScanSummary};
use crate::routes::auth::AuthParent;
use crate::services::error::{ApiError, LogErr};
use crate::services::tokens::TokenError;
use crate::services::youtube::YouTubeError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/videos/scan", post(scan))
        .route("/videos/analyze", post(analyze))
        .route("/videos/{id}/decision", post(set_decision))
        .route("/children/{id}/videos", get(list_videos))
}

/// Load a child and verify it belongs to the authenticated parent
async fn owned_child(
    state: &AppState,
    parent_id: i64,
    child_id: Option<i64>,
) -> Result<Child, ApiError> {
    let child_id = child_id.ok_or_else(|| ApiError::bad_request("childId is required"))?;

    children::get_child(&state.db, child_id, parent_id)
        .await
        .log_500("Get child error")?
        .ok_or_else(|| ApiError::not_found("Child not found"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanRequest {
    child_id: Option<i64>,
    max_results: Option<i64>,
}

/// POST /videos/scan - Ingest a child's recent watch history
async fn scan(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
    Json(req): Json<ScanRequest>,
) -> Result<Json<ScanSummary>, ApiError> {
    let child = owned_child(&state, parent_id, req.child_id).await?;
    let max_results = req.max_results.unwrap_or(YOUTUBE_PAGE_SIZE);

    let summary = pipeline::scan_child(
        &state.db,
        &state.youtube,
        &state.transcripts,
        child.id,
        max_results,
    )
    .await
    .map_err(scan_error)?;

    Ok(Json(summary))
}

/// Map pipeline precondition failures to user-visible statuses. Anything
/// past the preconditions is swallowed into the summary counts instead.
fn scan_error(e: ScanError) -> ApiError {
    match e {
        ScanError::Token(TokenError::NotConnected) => {
            ApiError::bad_request("YouTube not connected for this child")
        }
        ScanError::Token(TokenError::RefreshFailed(msg)) => {
            eprintln!("Scan token refresh failed: {}", msg);
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                "YouTube authentication expired. Please reconnect.",
            )
        }
        ScanError::YouTube(YouTubeError::AuthExpired) => ApiError::new(
            StatusCode::UNAUTHORIZED,
            "YouTube authentication expired. Please reconnect.",
        ),
        other => {
            eprintln!("Scan error: {}", other);
            ApiError::internal(format!("Failed to scan watch history: {}", other))
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    child_id: Option<i64>,
    limit: Option<i64>,
}

/// POST /videos/analyze - Classify a batch of unanalyzed videos
async fn analyze(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeSummary>, ApiError> {
    let child = owned_child(&state, parent_id, req.child_id).await?;

    // The classifier needs the preference set; refuse to run without one
    let prefs = preferences::get_preferences(&state.db, parent_id)
        .await
        .log_500("Get preferences error")?
        .ok_or_else(|| ApiError::bad_request("Preferences not set"))?;

    let limit = req.limit.unwrap_or(DEFAULT_ANALYZE_LIMIT).max(1);

    let summary = pipeline::analyze_child(
        &state.db,
        &state.transcripts,
        &state.classifier,
        &child,
        &prefs,
        limit,
    )
    .await
    .log_500("Analyze videos error")?;

    Ok(Json(summary))
}

/// GET /children/{id}/videos - List a child's videos, newest watch first
async fn list_videos(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
    Path(child_id): Path<i64>,
) -> Result<Json<Vec<videos::VideoRow>>, ApiError> {
    let child = owned_child(&state, parent_id, Some(child_id)).await?;

    let rows = videos::list_for_child(&state.db, child.id)
        .await
        .log_500("List videos error")?;

    Ok(Json(rows))
}

#[derive(Deserialize)]
struct DecisionRequest {
    decision: String,
}

/// POST /videos/{id}/decision - Parent override of the stored decision
async fn set_decision(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
    Path(video_id): Path<i64>,
    Json(req): Json<DecisionRequest>,
) -> Result<StatusCode, ApiError> {
    let decision = Decision::parse(&req.decision)
        .ok_or_else(|| ApiError::bad_request("Decision must be ALLOW, REVIEW, or BLOCK"))?;

    let updated = videos::set_decision_for_parent(&state.db, video_id, parent_id, decision)
        .await
        .log_500("Set decision error")?;

    if updated == 0 {
        return Err(ApiError::not_found("Video not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_not_connected_is_bad_request() {
        let err = scan_error(ScanError::Token(TokenError::NotConnected));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "YouTube not connected for this child");
    }

    #[test]
    fn test_scan_error_expired_auth_is_unauthorized() {
        let refresh = scan_error(ScanError::Token(TokenError::RefreshFailed(
            "invalid_grant".into(),
        )));
        assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);

        let expired = scan_error(ScanError::YouTube(YouTubeError::AuthExpired));
        assert_eq!(expired.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            expired.message,
            "YouTube authentication expired. Please reconnect."
        );
    }

    #[test]
    fn test_scan_error_api_failure_carries_upstream_text() {
        let err = scan_error(ScanError::YouTube(YouTubeError::Api(
            "quota exceeded".into(),
        )));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("quota exceeded"), "{}", err.message);
    }
}
