//! Parent content-preference endpoints
//!
//! Preferences are saved as a whole set. The classifier refuses to run
//! until a parent has saved them at least once.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::domain::preferences::{self, Preferences};
use crate::models::EducationalPriority;
use crate::routes::auth::AuthParent;
use crate::services::error::{ApiError, LogErr};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/preferences", get(get_preferences).put(put_preferences))
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferencesBody {
    allowed_topics: Vec<String>,
    blocked_topics: Vec<String>,
    allow_mild_language: bool,
    educational_priority: EducationalPriority,
}

/// GET /preferences - Fetch the saved preference set
async fn get_preferences(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
) -> Result<Json<PreferencesBody>, ApiError> {
    let prefs = preferences::get_preferences(&state.db, parent_id)
        .await
        .log_500("Get preferences error")?
        .ok_or_else(|| ApiError::not_found("Preferences not set"))?;

    Ok(Json(PreferencesBody {
        allowed_topics: prefs.allowed_topics,
        blocked_topics: prefs.blocked_topics,
        allow_mild_language: prefs.allow_mild_language,
        educational_priority: prefs.educational_priority,
    }))
}

/// PUT /preferences - Save the whole preference set (upsert)
async fn put_preferences(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
    Json(body): Json<PreferencesBody>,
) -> Result<StatusCode, ApiError> {
    let prefs = Preferences {
        allowed_topics: clean_topics(body.allowed_topics),
        blocked_topics: clean_topics(body.blocked_topics),
        allow_mild_language: body.allow_mild_language,
        educational_priority: body.educational_priority,
    };

    preferences::upsert_preferences(&state.db, parent_id, &prefs)
        .await
        .log_500("Upsert preferences error")?;

    Ok(StatusCode::NO_CONTENT)
}

/// Trim topics and drop empties; the topic lists feed straight into the
/// classifier prompt.
fn clean_topics(topics: Vec<String>) -> Vec<String> {
    topics
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_topics_trims_and_drops_empties() {
        let topics = vec![
            "  science ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "history".to_string(),
        ];
        assert_eq!(clean_topics(topics), vec!["science", "history"]);
    }
}
