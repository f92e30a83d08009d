//! Token Guardian: always hand callers a currently-valid access token
//!
//! Every refresh is a single read-check-write scoped by child id; the token
//! pair never lives anywhere but the child's row. Concurrent runs for the
//! same child can both see an expired token and both refresh; the second
//! write wins and both tokens are valid, so the race is left unguarded.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::constants::DEFAULT_TOKEN_TTL_SECS;
use crate::domain::children;
use crate::services::youtube::YouTubeClient;

#[derive(Debug)]
pub enum TokenError {
    /// The child has no stored token pair; no YouTube account is connected
    NotConnected,
    /// The refresh exchange failed; the child must be treated as disconnected
    RefreshFailed(String),
    Db(sqlx::Error),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::NotConnected => write!(f, "YouTube not connected for this child"),
            TokenError::RefreshFailed(e) => write!(f, "Token refresh failed: {}", e),
            TokenError::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<sqlx::Error> for TokenError {
    fn from(e: sqlx::Error) -> Self {
        TokenError::Db(e)
    }
}

/// Return a valid access token for the child, refreshing (and persisting
/// the new token + expiry) only when the stored one has expired.
pub async fn valid_access_token(
    db: &PgPool,
    youtube: &YouTubeClient,
    child_id: i64,
) -> Result<String, TokenError> {
    let tokens = children::get_tokens(db, child_id)
        .await?
        .ok_or(TokenError::NotConnected)?;

    let (Some(access_token), Some(refresh_token)) =
        (tokens.youtube_access_token, tokens.youtube_refresh_token)
    else {
        return Err(TokenError::NotConnected);
    };

    if token_is_fresh(tokens.token_expires_at, Utc::now()) {
        return Ok(access_token);
    }

    println!("[tokens] Access token expired for child {}, refreshing", child_id);
    let refreshed = youtube
        .refresh_access_token(&refresh_token)
        .await
        .map_err(|e| TokenError::RefreshFailed(e.to_string()))?;

    let ttl = refreshed.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
    let expires_at = Utc::now() + Duration::seconds(ttl);

    children::update_access_token(db, child_id, &refreshed.access_token, expires_at).await?;

    Ok(refreshed.access_token)
}

/// A token with no recorded expiry is treated as expired
fn token_is_fresh(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expiry) => now < expiry,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_expiry_is_fresh() {
        let now = Utc::now();
        assert!(token_is_fresh(Some(now + Duration::minutes(10)), now));
    }

    #[test]
    fn test_past_expiry_is_stale() {
        let now = Utc::now();
        assert!(!token_is_fresh(Some(now - Duration::seconds(1)), now));
        assert!(!token_is_fresh(Some(now), now));
    }

    #[test]
    fn test_missing_expiry_is_stale() {
        assert!(!token_is_fresh(None, Utc::now()));
    }
}
