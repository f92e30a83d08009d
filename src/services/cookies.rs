//! Cookie building for parent sessions
//!
//! Centralizes cookie formatting so login, refresh, and logout all set the
//! same attributes.

use axum::http::{HeaderValue, StatusCode};

pub const ACCESS_TOKEN_NAME: &str = "access_token";
pub const REFRESH_TOKEN_NAME: &str = "refresh_token";
const ACCESS_TOKEN_MAX_AGE_SECS: u32 = 600;
const REFRESH_TOKEN_MAX_AGE_SECS: u32 = 30 * 24 * 60 * 60;

fn is_dev() -> bool {
    std::env::var("ENV").as_deref() != Ok("prod")
}

fn build_cookie(name: &str, token: &str, max_age: u32) -> Result<HeaderValue, StatusCode> {
    let secure = if is_dev() { "" } else { " Secure;" };
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        name, token, secure, max_age
    );
    cookie.parse().map_err(|_| {
        eprintln!("Failed to parse {} cookie header", name);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

pub fn build_access_cookie(token: &str) -> Result<HeaderValue, StatusCode> {
    build_cookie(ACCESS_TOKEN_NAME, token, ACCESS_TOKEN_MAX_AGE_SECS)
}

pub fn build_refresh_cookie(token: &str) -> Result<HeaderValue, StatusCode> {
    build_cookie(REFRESH_TOKEN_NAME, token, REFRESH_TOKEN_MAX_AGE_SECS)
}

pub fn build_clear_access_cookie() -> HeaderValue {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        ACCESS_TOKEN_NAME
    )
    .parse()
    .expect("static cookie string should always parse")
}

pub fn build_clear_refresh_cookie() -> HeaderValue {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        REFRESH_TOKEN_NAME
    )
    .parse()
    .expect("static cookie string should always parse")
}
