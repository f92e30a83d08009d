//! Best-effort caption/transcript fetching
//!
//! Uses the public timedtext endpoint (JSON3 format). Roughly 70% of videos
//! have a retrievable transcript; the rest have captions disabled or none
//! at all, so failure is an expected outcome here, never an error. Repeat
//! attempts are avoided by persisting `transcript_fetch_failed` on the
//! video row.

use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;

use crate::constants::TRANSCRIPT_FETCH_DELAY_MS;

const TIMEDTEXT_URL: &str = "https://video.google.com/timedtext";

#[derive(Clone)]
pub struct TranscriptClient {
    http: Client,
}

/// Result of one transcript attempt. `fetch_failed` is recorded on the
/// video so the fetch is never retried.
#[derive(Debug, Clone)]
pub struct TranscriptResult {
    pub transcript: Option<String>,
    pub fetch_failed: bool,
}

impl TranscriptResult {
    fn failed() -> Self {
        Self {
            transcript: None,
            fetch_failed: true,
        }
    }
}

// timedtext JSON3 wire format

#[derive(Debug, Deserialize)]
struct TimedText {
    events: Option<Vec<TimedTextEvent>>,
}

#[derive(Debug, Deserialize)]
struct TimedTextEvent {
    segs: Option<Vec<TimedTextSeg>>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSeg {
    utf8: Option<String>,
}

impl TranscriptClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    /// Fetch a flattened transcript for one video. All failures are caught
    /// locally; this always yields a result value.
    pub async fn fetch(&self, video_id: &str) -> TranscriptResult {
        match self.try_fetch(video_id).await {
            Ok(Some(text)) => TranscriptResult {
                transcript: Some(text),
                fetch_failed: false,
            },
            Ok(None) => TranscriptResult::failed(),
            Err(e) => {
                eprintln!("[transcript] Fetch failed for video {}: {}", video_id, e);
                TranscriptResult::failed()
            }
        }
    }

    async fn try_fetch(
        &self,
        video_id: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}?lang=en&fmt=json3&v={}", TIMEDTEXT_URL, video_id);
        let resp = self.http.get(&url).send().await?;

        if !resp.status().is_success() {
            return Ok(None);
        }

        let body: TimedText = resp.json().await?;
        let segments: Vec<String> = body
            .events
            .unwrap_or_default()
            .into_iter()
            .flat_map(|e| e.segs.unwrap_or_default())
            .filter_map(|s| s.utf8)
            .collect();

        Ok(join_segments(&segments))
    }

    /// Fetch transcripts for many videos, strictly sequentially with a fixed
    /// inter-item pause to stay under the upstream rate limit.
    pub async fn fetch_many(&self, video_ids: &[String]) -> HashMap<String, TranscriptResult> {
        let mut results = HashMap::new();

        for video_id in video_ids {
            let result = self.fetch(video_id).await;
            results.insert(video_id.clone(), result);
            tokio::time::sleep(std::time::Duration::from_millis(TRANSCRIPT_FETCH_DELAY_MS)).await;
        }

        results
    }
}

/// Join caption segments with single spaces and trim. An empty or
/// whitespace-only segment list is treated the same as a fetch failure.
fn join_segments(segments: &[String]) -> Option<String> {
    let joined = segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() { None } else { Some(joined) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_segments_spaces_and_trims() {
        let segs = vec![
            "  hello".to_string(),
            "world\n".to_string(),
            "again".to_string(),
        ];
        assert_eq!(join_segments(&segs).as_deref(), Some("hello world again"));
    }

    #[test]
    fn test_join_segments_empty_is_none() {
        assert_eq!(join_segments(&[]), None);
        assert_eq!(join_segments(&["  ".to_string(), "\n".to_string()]), None);
    }

    #[test]
    fn test_json3_parse() {
        let body = r#"{"events":[{"segs":[{"utf8":"first"},{"utf8":" second"}]},{"tStartMs":100},{"segs":[{"utf8":"third"}]}]}"#;
        let parsed: TimedText = serde_json::from_str(body).unwrap();
        let segments: Vec<String> = parsed
            .events
            .unwrap()
            .into_iter()
            .flat_map(|e| e.segs.unwrap_or_default())
            .filter_map(|s| s.utf8)
            .collect();
        assert_eq!(
            join_segments(&segments).as_deref(),
            Some("first second third")
        );
    }
}
