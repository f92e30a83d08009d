//! YouTube account connect/disconnect endpoints (per child)
//!
//! The connect flow is Google's web-server authorization-code grant. The
//! callback is hit by the browser following Google's redirect, so it
//! carries no session cookie guarantees; the state row ties the callback
//! back to the child it was issued for.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use crate::AppState;
use crate::constants::DEFAULT_TOKEN_TTL_SECS;
use crate::domain::children;
use crate::routes::auth::AuthParent;
use crate::services::error::{ApiError, LogErr};
use crate::services::youtube;

pub fn routes() -> Router<Arc<AppState>> {
    // Stricter limit for the OAuth surface
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(12)
        .burst_size(5)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/youtube/oauth/start", get(oauth_start))
        .route("/youtube/oauth/callback", get(oauth_callback))
        .route("/youtube/disconnect", post(disconnect))
        .layer(rate_limit_layer)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartQuery {
    child_id: i64,
}

/// GET /youtube/oauth/start?childId= - Redirect the parent to Google consent
async fn oauth_start(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
    Query(query): Query<StartQuery>,
) -> Result<Redirect, ApiError> {
    let child = children::get_child(&state.db, query.child_id, parent_id)
        .await
        .log_500("Get child error")?
        .ok_or_else(|| ApiError::not_found("Child not found"))?;

    let oauth_state = youtube::generate_state();
    youtube::save_oauth_state(&state.db, &oauth_state, parent_id, child.id)
        .await
        .log_500("Save OAuth state error")?;

    Ok(Redirect::to(&state.youtube.authorize_url(&oauth_state)))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /youtube/oauth/callback - Google redirects here after consent.
/// Always redirects back to the dashboard with a status flag; errors are
/// logged server-side since the browser is mid-redirect.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    match handle_callback(&state, query).await {
        Ok(()) => dashboard_redirect(&state, "connected"),
        Err(flag) => dashboard_redirect(&state, flag),
    }
}

fn dashboard_redirect(state: &AppState, flag: &str) -> Redirect {
    Redirect::to(&format!("{}?youtube={}", state.dashboard_url, flag))
}

async fn handle_callback(state: &AppState, query: CallbackQuery) -> Result<(), &'static str> {
    if let Some(error) = query.error {
        // The parent declined consent (or Google refused)
        eprintln!("[oauth] Consent error from Google: {}", error);
        return Err("denied");
    }

    let (code, oauth_state) = match (query.code, query.state) {
        (Some(code), Some(oauth_state)) => (code, oauth_state),
        _ => return Err("error"),
    };

    // Single use, TTL enforced; a replayed callback lands here
    let child_id = youtube::consume_oauth_state(&state.db, &oauth_state)
        .await
        .map_err(|e| {
            eprintln!("[oauth] Consume state error: {}", e);
            "error"
        })?
        .ok_or("error")?;

    let tokens = state.youtube.exchange_code(&code).await.map_err(|e| {
        eprintln!("[oauth] Code exchange error: {}", e);
        "error"
    })?;

    // Without a refresh token the connection dies within the hour, so treat
    // its absence as a failed connect
    let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
        eprintln!("[oauth] No refresh token in exchange response");
        "error"
    })?;

    let channel_id = state
        .youtube
        .channel_id(&tokens.access_token)
        .await
        .map_err(|e| {
            eprintln!("[oauth] Channel lookup error: {}", e);
            "nochannel"
        })?;

    let ttl = tokens.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
    let expires_at = Utc::now() + Duration::seconds(ttl);

    children::set_connection(
        &state.db,
        child_id,
        &channel_id,
        &tokens.access_token,
        refresh_token,
        expires_at,
    )
    .await
    .map_err(|e| {
        eprintln!("[oauth] Save connection error: {}", e);
        "error"
    })?;

    println!("[oauth] Child {} connected to channel {}", child_id, channel_id);
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisconnectRequest {
    child_id: i64,
}

/// POST /youtube/disconnect - Revoke tokens upstream and clear the connection
async fn disconnect(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
    Json(req): Json<DisconnectRequest>,
) -> Result<StatusCode, ApiError> {
    let child = children::get_child(&state.db, req.child_id, parent_id)
        .await
        .log_500("Get child error")?
        .ok_or_else(|| ApiError::not_found("Child not found"))?;

    // Best-effort revoke; the local clear is what actually disconnects
    if let Ok(Some(tokens)) = children::get_tokens(&state.db, child.id).await {
        if let Some(access_token) = tokens.youtube_access_token {
            if let Err(e) = state.youtube.revoke_token(&access_token).await {
                eprintln!("[oauth] Revoke error for child {}: {}", child.id, e);
            }
        }
    }

    children::clear_connection(&state.db, child.id)
        .await
        .log_500("Clear connection error")?;

    Ok(StatusCode::NO_CONTENT)
}
