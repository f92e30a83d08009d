//! YouTube OAuth and Data API client
//!
//! One client covers the whole upstream surface: authorization-code OAuth
//! (offline access so we hold a refresh token per child), watch-history
//! listing with its fallback tiers, and batched video metadata lookup.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;

use crate::constants::{METADATA_BATCH_SIZE, OAUTH_STATE_TTL_MINUTES, YOUTUBE_PAGE_SIZE};

const OAUTH_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const OAUTH_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Special playlist id for the account's watch history
const HISTORY_PLAYLIST_ID: &str = "HL";

#[derive(Clone)]
pub struct YouTubeClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: Client,
}

#[derive(Debug)]
pub enum YouTubeError {
    Http(reqwest::Error),
    /// Non-success response from the API, with the upstream body text
    Api(String),
    /// Token rejected even after refresh; the child must reconnect
    AuthExpired,
    /// The account has no YouTube channel
    NoChannel,
}

impl From<reqwest::Error> for YouTubeError {
    fn from(e: reqwest::Error) -> Self {
        YouTubeError::Http(e)
    }
}

impl std::fmt::Display for YouTubeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YouTubeError::Http(e) => write!(f, "HTTP error: {}", e),
            YouTubeError::Api(s) => write!(f, "YouTube API error: {}", s),
            YouTubeError::AuthExpired => {
                write!(f, "YouTube authentication expired. Please reconnect.")
            }
            YouTubeError::NoChannel => write!(f, "No YouTube channel found for this account"),
        }
    }
}

impl std::error::Error for YouTubeError {}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// One watch-history entry: a video id with coarse metadata.
#[derive(Debug, Clone)]
pub struct WatchHistoryItem {
    pub video_id: String,
    pub watched_at: DateTime<Utc>,
    pub title: String,
    pub channel_name: String,
    pub channel_id: String,
    pub thumbnail: String,
}

/// Full per-video metadata from the batched lookup.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_name: String,
    pub channel_id: String,
    pub thumbnail: String,
    pub duration_secs: i32,
}

// Wire types (YouTube Data API v3)

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    published_at: Option<DateTime<Utc>>,
    title: Option<String>,
    description: Option<String>,
    channel_id: Option<String>,
    channel_title: Option<String>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    snippet: Option<Snippet>,
    content_details: Option<PlaylistItemDetails>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    items: Option<Vec<PlaylistItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: Option<String>,
    snippet: Option<Snippet>,
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    items: Option<Vec<VideoItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    id: Option<String>,
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    items: Option<Vec<ChannelItem>>,
}

impl YouTubeClient {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            http: Client::new(),
        }
    }

    /// Build the Google consent URL. `access_type=offline` + `prompt=consent`
    /// so the exchange returns a refresh token.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&access_type=offline&prompt=consent&state={}",
            OAUTH_AUTHORIZE_URL,
            percent_encode(&self.client_id),
            percent_encode(&self.redirect_uri),
            percent_encode("https://www.googleapis.com/auth/youtube.readonly"),
            percent_encode(state),
        )
    }

    /// Exchange an authorization code for an access + refresh token pair
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, YouTubeError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let resp = self.http.post(OAUTH_TOKEN_URL).form(&params).send().await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(YouTubeError::Api(format!("Token exchange failed: {}", text)));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, YouTubeError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let resp = self.http.post(OAUTH_TOKEN_URL).form(&params).send().await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(YouTubeError::Api(format!("Token refresh failed: {}", text)));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }

    /// Best-effort revoke of an access or refresh token
    pub async fn revoke_token(&self, token: &str) -> Result<(), YouTubeError> {
        let resp = self
            .http
            .post(OAUTH_REVOKE_URL)
            .form(&[("token", token)])
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(YouTubeError::Api(format!("Token revoke failed: {}", text)));
        }

        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, YouTubeError> {
        let resp = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(YouTubeError::AuthExpired);
        }
        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(YouTubeError::Api(text));
        }

        Ok(resp.json().await?)
    }

    /// The authenticated account's channel id
    pub async fn channel_id(&self, access_token: &str) -> Result<String, YouTubeError> {
        let url = format!("{}/channels?part=id&mine=true", API_BASE);
        let resp: ChannelListResponse = self.get_json(&url, access_token).await?;

        resp.items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.id)
            .next()
            .ok_or(YouTubeError::NoChannel)
    }

    /// Recently watched videos, best signal first.
    ///
    /// Tier 1 is the special "HL" history playlist. Accounts that have
    /// history sharing disabled return it empty, so tier 2 falls back to
    /// videos the account rated "like" (watched_at becomes the video's
    /// publish date, a proxy, not an actual watch time) and tier 3 to the
    /// account's own uploads. One page only; `max_results` is clamped to
    /// the API ceiling of 50.
    pub async fn list_watch_history(
        &self,
        access_token: &str,
        max_results: i64,
    ) -> Result<Vec<WatchHistoryItem>, YouTubeError> {
        let page_size = max_results.clamp(1, YOUTUBE_PAGE_SIZE);

        let history = self
            .playlist_items(access_token, HISTORY_PLAYLIST_ID, page_size)
            .await?;
        if !history.is_empty() {
            println!("[youtube] Found {} videos in watch history", history.len());
            return Ok(history);
        }

        println!("[youtube] No watch history available, falling back to liked videos");
        let liked = self.liked_videos(access_token, page_size).await?;
        if !liked.is_empty() {
            return Ok(liked);
        }

        println!("[youtube] No liked videos, falling back to channel uploads");
        let url = format!("{}/channels?part=contentDetails&mine=true", API_BASE);
        let channels: ChannelListResponse = self.get_json(&url, access_token).await?;

        let uploads_playlist = channels
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.content_details)
            .filter_map(|d| d.related_playlists)
            .filter_map(|p| p.uploads)
            .next();

        match uploads_playlist {
            Some(playlist_id) => {
                self.playlist_items(access_token, &playlist_id, page_size)
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    async fn playlist_items(
        &self,
        access_token: &str,
        playlist_id: &str,
        page_size: i64,
    ) -> Result<Vec<WatchHistoryItem>, YouTubeError> {
        let url = format!(
            "{}/playlistItems?part=snippet%2CcontentDetails&playlistId={}&maxResults={}",
            API_BASE,
            percent_encode(playlist_id),
            page_size
        );
        let resp: PlaylistItemsResponse = self.get_json(&url, access_token).await?;

        let items = resp
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let video_id = item.content_details.and_then(|d| d.video_id)?;
                Some(history_item(video_id, item.snippet))
            })
            .collect();

        Ok(items)
    }

    async fn liked_videos(
        &self,
        access_token: &str,
        page_size: i64,
    ) -> Result<Vec<WatchHistoryItem>, YouTubeError> {
        let url = format!(
            "{}/videos?part=snippet%2CcontentDetails&myRating=like&maxResults={}",
            API_BASE, page_size
        );
        let resp: VideoListResponse = self.get_json(&url, access_token).await?;

        let items = resp
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id?;
                Some(history_item(video_id, item.snippet))
            })
            .collect();

        Ok(items)
    }

    /// Full metadata for a list of video ids, in batches of at most 50.
    ///
    /// A failed batch is logged and skipped; its videos are simply absent
    /// from the result. Callers treat absent metadata as "skip this video".
    pub async fn video_metadata(
        &self,
        video_ids: &[String],
        access_token: &str,
    ) -> Vec<VideoMetadata> {
        let mut all = Vec::new();

        for chunk in video_ids.chunks(METADATA_BATCH_SIZE) {
            let url = format!(
                "{}/videos?part=snippet%2CcontentDetails&id={}",
                API_BASE,
                chunk.join("%2C")
            );

            let resp: Result<VideoListResponse, YouTubeError> =
                self.get_json(&url, access_token).await;

            match resp {
                Ok(page) => {
                    for item in page.items.unwrap_or_default() {
                        let Some(video_id) = item.id else { continue };
                        let snippet = item.snippet.unwrap_or_else(empty_snippet);
                        let duration = item
                            .content_details
                            .and_then(|d| d.duration)
                            .unwrap_or_default();

                        all.push(VideoMetadata {
                            video_id,
                            title: snippet.title.unwrap_or_default(),
                            description: snippet.description.unwrap_or_default(),
                            channel_name: snippet.channel_title.unwrap_or_default(),
                            channel_id: snippet.channel_id.unwrap_or_default(),
                            thumbnail: thumbnail_url(snippet.thumbnails),
                            duration_secs: parse_duration(&duration) as i32,
                        });
                    }
                }
                Err(e) => {
                    eprintln!("[youtube] Metadata batch failed ({} ids): {}", chunk.len(), e);
                }
            }
        }

        all
    }
}

fn history_item(video_id: String, snippet: Option<Snippet>) -> WatchHistoryItem {
    let snippet = snippet.unwrap_or_else(empty_snippet);
    WatchHistoryItem {
        video_id,
        watched_at: snippet.published_at.unwrap_or_else(Utc::now),
        title: snippet.title.unwrap_or_default(),
        channel_name: snippet.channel_title.unwrap_or_default(),
        channel_id: snippet.channel_id.unwrap_or_default(),
        thumbnail: thumbnail_url(snippet.thumbnails),
    }
}

fn empty_snippet() -> Snippet {
    Snippet {
        published_at: None,
        title: None,
        description: None,
        channel_id: None,
        channel_title: None,
        thumbnails: None,
    }
}

fn thumbnail_url(thumbnails: Option<Thumbnails>) -> String {
    thumbnails
        .and_then(|t| t.medium)
        .map(|t| t.url)
        .unwrap_or_default()
}

/// Random URL-safe state token for the OAuth redirect
pub fn generate_state() -> String {
    use base64::Engine;
    use rand::Rng;
    let bytes: [u8; 24] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

/// Decode an ISO-8601 duration token (`PT#H#M#S`) to total seconds.
/// Absent components count as zero; a wholly unparseable string is zero.
pub fn parse_duration(duration: &str) -> u32 {
    let Some(rest) = duration.strip_prefix("PT") else {
        return 0;
    };

    let mut total: u32 = 0;
    let mut number = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let value: u32 = number.parse().unwrap_or(0);
        number.clear();
        // Saturating: a hostile duration caps out instead of panicking
        match c {
            'H' => total = total.saturating_add(value.saturating_mul(3600)),
            'M' => total = total.saturating_add(value.saturating_mul(60)),
            'S' => total = total.saturating_add(value),
            _ => return 0,
        }
    }

    total
}

// ============================================================================
// OAuth state storage (CSRF protection for the connect flow)
// ============================================================================

/// Store a pending OAuth state with the parent and child it was issued for
pub async fn save_oauth_state(
    db: &PgPool,
    state: &str,
    parent_id: i64,
    child_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO oauth_states (state, parent_id, child_id)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(state)
    .bind(parent_id)
    .bind(child_id)
    .execute(db)
    .await?;
    Ok(())
}

/// Look up and delete an OAuth state, returning the child it was issued for.
/// Single use: the delete makes a replayed callback fail. States older than
/// the TTL are treated as never having existed.
pub async fn consume_oauth_state(db: &PgPool, state: &str) -> Result<Option<i64>, sqlx::Error> {
    let cutoff = Utc::now() - Duration::minutes(OAUTH_STATE_TTL_MINUTES);

    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        DELETE FROM oauth_states
        WHERE state = $1 AND created_at > $2
        RETURNING child_id
        "#,
    )
    .bind(state)
    .bind(cutoff)
    .fetch_optional(db)
    .await?;

    Ok(row.map(|r| r.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_full() {
        assert_eq!(parse_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_duration("PT15M33S"), 933);
        assert_eq!(parse_duration("PT45S"), 45);
        assert_eq!(parse_duration("PT2H"), 7200);
    }

    #[test]
    fn test_parse_duration_saturates_instead_of_overflowing() {
        assert_eq!(parse_duration("PT2000000H"), u32::MAX);
        assert_eq!(parse_duration("PT4294967295S"), u32::MAX);
    }

    #[test]
    fn test_parse_duration_garbage_is_zero() {
        assert_eq!(parse_duration(""), 0);
        assert_eq!(parse_duration("not a duration"), 0);
        assert_eq!(parse_duration("P1D"), 0);
        assert_eq!(parse_duration("PT1X"), 0);
    }

    #[test]
    fn test_authorize_url_carries_state_and_scope() {
        let client = YouTubeClient::new("client-id", "secret", "https://app.example/cb");
        let url = client.authorize_url("state-123");
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("state=state%2D123"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("youtube%2Ereadonly"));
    }

    #[test]
    fn test_history_item_defaults() {
        let item = history_item("abc123".to_string(), None);
        assert_eq!(item.video_id, "abc123");
        assert_eq!(item.title, "");
        assert_eq!(item.thumbnail, "");
    }
}
