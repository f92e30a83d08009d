//! Parent account and session endpoints

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::SET_COOKIE, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use crate::AppState;
use crate::domain::parents;
use crate::services::error::{ApiError, LogErr};
use crate::services::password::{self, MIN_PASSWORD_LENGTH};
use crate::services::{cookies, session};

pub fn routes() -> Router<Arc<AppState>> {
    // Rate limit auth endpoints to slow down credential stuffing
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_session))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
        .layer(rate_limit_layer)
}

// ============================================================================
// Auth Extractor - validates JWT cookie and extracts parent_id
// ============================================================================

/// Extractor that validates the access_token cookie and returns the parent_id
pub struct AuthParent(pub i64);

impl FromRequestParts<Arc<AppState>> for AuthParent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .log_500("Cookie extraction error")?;

        let access_token = jar
            .get(cookies::ACCESS_TOKEN_NAME)
            .map(|c| c.value())
            .ok_or_else(ApiError::unauthorized)?;

        let parent_id = session::validate_access_token(access_token, &state.jwt_secret)
            .map_err(|e| {
                eprintln!("JWT validation failed: {}", e);
                ApiError::unauthorized()
            })?;

        Ok(AuthParent(parent_id))
    }
}

// ============================================================================
// Account endpoints
// ============================================================================

#[derive(Deserialize)]
struct SignupRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct ParentResponse {
    id: i64,
    email: String,
}

/// POST /auth/signup - Create a parent account and start a session
async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    if req.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let password_hash = password::hash_password(&req.password).log_500("Hash password error")?;

    let parent_id = match parents::insert_parent(&state.db, &email, &password_hash).await {
        Ok(id) => id,
        Err(e) if parents::is_unique_violation(&e) => {
            return Err(ApiError::bad_request("Email already registered"));
        }
        Err(e) => {
            eprintln!("Insert parent error: {}", e);
            return Err(ApiError::internal("Insert parent error"));
        }
    };

    let body = Json(ParentResponse {
        id: parent_id,
        email,
    });
    let mut response = (StatusCode::CREATED, body).into_response();
    append_session_cookies(&mut response, parent_id, &state).await?;

    Ok(response)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// POST /auth/login - Verify credentials and start a session
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = req.email.trim().to_lowercase();

    let credentials = parents::get_credentials_by_email(&state.db, &email)
        .await
        .log_500("Get credentials error")?;

    // Same error for unknown email and wrong password
    let invalid = || ApiError::new(StatusCode::UNAUTHORIZED, "Invalid email or password");
    let credentials = credentials.ok_or_else(invalid)?;

    let ok = password::verify_password(&req.password, &credentials.password_hash)
        .log_500("Verify password error")?;
    if !ok {
        return Err(invalid());
    }

    let body = Json(ParentResponse {
        id: credentials.id,
        email,
    });
    let mut response = body.into_response();
    append_session_cookies(&mut response, credentials.id, &state).await?;

    Ok(response)
}

/// POST /auth/refresh - Refresh the access token using the refresh token cookie.
/// Implements refresh token rotation: old token is invalidated, new one is issued.
async fn refresh_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let old_refresh_token = jar
        .get(cookies::REFRESH_TOKEN_NAME)
        .map(|c| c.value().to_string())
        .ok_or_else(ApiError::unauthorized)?;

    // Rotate: validate old, delete it, create new. The delete is atomic, so a
    // doubly-submitted refresh only succeeds once.
    // (silent - invalid/expired tokens are expected for expired sessions)
    let (parent_id, new_refresh_token) =
        session::rotate_refresh_token(&old_refresh_token, &state.db)
            .await
            .map_err(|_| ApiError::unauthorized())?;

    let access_token = session::create_access_token(parent_id, &state.jwt_secret)
        .log_500("Create access token error")?;

    // 204 No Content - only sets cookies
    let mut response = StatusCode::NO_CONTENT.into_response();
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_access_cookie(&access_token).log_500("Build access cookie error")?,
    );
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_refresh_cookie(&new_refresh_token).log_500("Build refresh cookie error")?,
    );

    Ok(response)
}

/// POST /auth/logout - Clear session and revoke refresh token
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(refresh_token) = jar.get(cookies::REFRESH_TOKEN_NAME) {
        if let Err(e) = session::revoke_refresh_token(refresh_token.value(), &state.db).await {
            // Log but don't fail logout - the client is logged out either way
            eprintln!("Failed to revoke refresh token during logout: {}", e);
        }
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_clear_access_cookie());
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_clear_refresh_cookie());

    response
}

/// GET /auth/me - Get current parent info (validates session)
async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthParent(parent_id): AuthParent,
) -> Result<Json<ParentResponse>, ApiError> {
    let parent = parents::get_parent_by_id(&state.db, parent_id)
        .await
        .log_500("Get parent by ID error")?;

    // A valid JWT for a deleted account is still unauthorized
    let parent = parent.ok_or_else(ApiError::unauthorized)?;

    Ok(Json(ParentResponse {
        id: parent.id,
        email: parent.email,
    }))
}

async fn append_session_cookies(
    response: &mut Response,
    parent_id: i64,
    state: &AppState,
) -> Result<(), ApiError> {
    let access_token = session::create_access_token(parent_id, &state.jwt_secret)
        .log_500("Create access token error")?;
    let refresh_token = session::create_refresh_token(parent_id, &state.db)
        .await
        .log_500("Create refresh token error")?;

    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_access_cookie(&access_token).log_500("Build access cookie error")?,
    );
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_refresh_cookie(&refresh_token).log_500("Build refresh cookie error")?,
    );

    Ok(())
}
