//! Child profile endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::domain::children::{self, ChildSummary};
use crate::routes::auth::AuthParent;
use crate::services::error::{ApiError, LogErr};

const MIN_AGE: i32 = 1;
const MAX_AGE: i32 = 18;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/children", get(list_children).post(create_child))
        .route("/children/{id}", delete(remove_child))
}

#[derive(Deserialize)]
struct CreateChildRequest {
    name: String,
    age: i32,
}

#[derive(Serialize)]
struct ChildCreatedResponse {
    id: i64,
    name: String,
    age: i32,
}

/// POST /children - Add a child profile
async fn create_child(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
    Json(req): Json<CreateChildRequest>,
) -> Result<(StatusCode, Json<ChildCreatedResponse>), ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }
    if !(MIN_AGE..=MAX_AGE).contains(&req.age) {
        return Err(ApiError::bad_request(format!(
            "Age must be between {} and {}",
            MIN_AGE, MAX_AGE
        )));
    }

    let child_id = children::insert_child(&state.db, parent_id, name, req.age)
        .await
        .log_500("Insert child error")?;

    Ok((
        StatusCode::CREATED,
        Json(ChildCreatedResponse {
            id: child_id,
            name: name.to_string(),
            age: req.age,
        }),
    ))
}

/// GET /children - List the parent's children with connection status
async fn list_children(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
) -> Result<Json<Vec<ChildSummary>>, ApiError> {
    let children = children::list_children(&state.db, parent_id)
        .await
        .log_500("List children error")?;

    Ok(Json(children))
}

/// DELETE /children/{id} - Remove a child and all their videos (cascade)
async fn remove_child(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
    Path(child_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = children::delete_child(&state.db, child_id, parent_id)
        .await
        .log_500("Delete child error")?;

    if deleted == 0 {
        return Err(ApiError::not_found("Child not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
