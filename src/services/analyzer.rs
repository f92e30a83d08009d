//! External classifier client
//!
//! Sends one chat-completion request per video to an OpenAI-compatible API
//! and parses the JSON verdict out of the reply. The classifier is never
//! allowed to surface a transport or parse error to the pipeline: any
//! failure becomes a conservative synthetic REVIEW verdict, and the
//! two-branch `AnalysisOutcome` lets callers (and tests) distinguish a real
//! model verdict from a masked failure.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::{DESCRIPTION_EXCERPT_CHARS, TRANSCRIPT_EXCERPT_CHARS};
use crate::domain::preferences::Preferences;
use crate::models::{Decision, Verdict};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const SYSTEM_PROMPT: &str = "You are a content analysis AI specialized in determining if YouTube videos are appropriate for children. Always respond with valid JSON only.";

#[derive(Clone)]
pub struct ClassifierClient {
    api_key: String,
    model: String,
    http: Client,
}

/// Video fields handed to the classifier.
#[derive(Debug)]
pub struct AnalysisInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub channel_name: &'a str,
    pub duration_secs: i32,
    pub transcript: Option<&'a str>,
}

/// A verdict plus its provenance: a genuine model verdict, or the synthetic
/// fallback substituted when the classifier failed.
#[derive(Debug)]
pub enum AnalysisOutcome {
    Model(Verdict),
    Fallback(Verdict),
}

impl AnalysisOutcome {
    pub fn verdict(&self) -> &Verdict {
        match self {
            AnalysisOutcome::Model(v) | AnalysisOutcome::Fallback(v) => v,
        }
    }
}

#[derive(Debug)]
enum ClassifierError {
    Http(reqwest::Error),
    Api(String),
    EmptyResponse,
    InvalidVerdict(String),
}

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        ClassifierError::Http(e)
    }
}

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierError::Http(e) => write!(f, "HTTP error: {}", e),
            ClassifierError::Api(s) => write!(f, "Classifier API error: {}", s),
            ClassifierError::EmptyResponse => write!(f, "No response from classifier"),
            ClassifierError::InvalidVerdict(s) => write!(f, "Invalid verdict: {}", s),
        }
    }
}

// Chat completions wire types

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Raw verdict shape as the model emits it, before validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    decision: Option<String>,
    confidence: Option<f64>,
    category: Option<String>,
    educational_value: Option<f64>,
    concerns: Option<Vec<String>>,
    reasoning: Option<String>,
}

impl ClassifierClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: Client::new(),
        }
    }

    /// Classify one video for one child. Never fails: a classifier error or
    /// malformed reply yields `AnalysisOutcome::Fallback`.
    pub async fn analyze_video(
        &self,
        video: &AnalysisInput<'_>,
        child_age: i32,
        preferences: &Preferences,
    ) -> AnalysisOutcome {
        let prompt = build_prompt(video, child_age, preferences);

        match self.request_verdict(&prompt).await {
            Ok(verdict) => AnalysisOutcome::Model(verdict),
            Err(e) => {
                eprintln!("[analyzer] Classification failed: {}", e);
                AnalysisOutcome::Fallback(fallback_verdict())
            }
        }
    }

    async fn request_verdict(&self, prompt: &str) -> Result<Verdict, ClassifierError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            // Low temperature for consistent verdicts
            temperature: 0.3,
            response_format: serde_json::json!({ "type": "json_object" }),
        };

        let resp = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(ClassifierError::Api(text));
        }

        let body: ChatResponse = resp.json().await?;
        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or(ClassifierError::EmptyResponse)?;

        parse_verdict(content)
    }
}

/// Parse and validate the model's JSON reply. A missing or out-of-enum
/// `decision` is rejected; numeric fields are clamped into range.
fn parse_verdict(content: &str) -> Result<Verdict, ClassifierError> {
    let raw: RawVerdict = serde_json::from_str(content)
        .map_err(|e| ClassifierError::InvalidVerdict(e.to_string()))?;

    let decision = raw
        .decision
        .as_deref()
        .and_then(Decision::parse)
        .ok_or_else(|| {
            ClassifierError::InvalidVerdict(format!("decision was {:?}", raw.decision))
        })?;

    Ok(Verdict {
        decision,
        confidence: (raw.confidence.unwrap_or(0.0) as i32).clamp(0, 100),
        category: raw.category.unwrap_or_else(|| "other".to_string()),
        educational_value: (raw.educational_value.unwrap_or(0.0) as i32).clamp(0, 10),
        concerns: raw.concerns.unwrap_or_default(),
        reasoning: raw.reasoning.unwrap_or_default(),
    })
}

/// The conservative verdict substituted when classification fails
fn fallback_verdict() -> Verdict {
    Verdict {
        decision: Decision::Review,
        confidence: 0,
        category: "other".to_string(),
        educational_value: 5,
        concerns: vec!["ai_analysis_failed".to_string()],
        reasoning: "AI analysis failed - manual review needed".to_string(),
    }
}

fn build_prompt(video: &AnalysisInput<'_>, child_age: i32, preferences: &Preferences) -> String {
    let minutes = video.duration_secs / 60;
    let seconds = video.duration_secs % 60;

    let transcript_line = match video.transcript {
        Some(t) => format!(
            "- Transcript (first {} chars): {}",
            TRANSCRIPT_EXCERPT_CHARS,
            truncate_chars(t, TRANSCRIPT_EXCERPT_CHARS)
        ),
        None => "- Transcript: Not available".to_string(),
    };

    format!(
        r#"You are analyzing a YouTube video to determine if it's appropriate for a child.

CHILD PROFILE:
- Age: {} years old

PARENT PREFERENCES:
- Allowed topics: {}
- Blocked topics: {}
- Allow mild language in educational content: {}
- Educational priority: {}

VIDEO INFORMATION:
- Title: {}
- Channel: {}
- Duration: {}:{:02} ({} seconds)
- Description: {}
{}

Analyze this video and respond ONLY with valid JSON matching this exact structure:
{{
  "decision": "ALLOW" | "REVIEW" | "BLOCK",
  "confidence": 0-100,
  "category": "educational" | "entertainment" | "gaming" | "vlog" | "music" | "other",
  "educationalValue": 0-10,
  "concerns": ["array", "of", "concerns"],
  "reasoning": "Brief explanation (max 100 words)"
}}

Decision guidelines:
- ALLOW: Content aligns with preferences and is age-appropriate
- REVIEW: Uncertain or borderline content that parent should review
- BLOCK: Clear violation of preferences or age-inappropriate

Consider:
1. Child's age and maturity
2. Parent's allowed/blocked topics
3. Educational value
4. Language, violence, inappropriate themes
5. Context (educational content may have mild language if allowed)"#,
        child_age,
        preferences.allowed_topics.join(", "),
        preferences.blocked_topics.join(", "),
        if preferences.allow_mild_language {
            "Yes"
        } else {
            "No"
        },
        preferences.educational_priority.as_str(),
        video.title,
        video.channel_name,
        minutes,
        seconds,
        video.duration_secs,
        truncate_chars(video.description, DESCRIPTION_EXCERPT_CHARS),
        transcript_line,
    )
}

/// Char-boundary-safe prefix truncation
fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EducationalPriority;

    fn test_prefs() -> Preferences {
        Preferences {
            allowed_topics: vec!["science".to_string(), "history".to_string()],
            blocked_topics: vec!["violence".to_string()],
            allow_mild_language: false,
            educational_priority: EducationalPriority::High,
        }
    }

    #[test]
    fn test_parse_verdict_valid() {
        let content = r#"{
            "decision": "ALLOW",
            "confidence": 92,
            "category": "educational",
            "educationalValue": 8,
            "concerns": [],
            "reasoning": "Age-appropriate science content"
        }"#;
        let verdict = parse_verdict(content).unwrap();
        assert_eq!(verdict.decision, Decision::Allow);
        assert_eq!(verdict.confidence, 92);
        assert_eq!(verdict.educational_value, 8);
    }

    #[test]
    fn test_parse_verdict_rejects_bad_decision() {
        assert!(parse_verdict(r#"{"decision": "MAYBE"}"#).is_err());
        assert!(parse_verdict(r#"{"confidence": 50}"#).is_err());
        assert!(parse_verdict("not json at all").is_err());
    }

    #[test]
    fn test_parse_verdict_clamps_ranges() {
        let content = r#"{"decision": "BLOCK", "confidence": 250, "educationalValue": -3}"#;
        let verdict = parse_verdict(content).unwrap();
        assert_eq!(verdict.confidence, 100);
        assert_eq!(verdict.educational_value, 0);
        assert_eq!(verdict.category, "other");
        assert!(verdict.concerns.is_empty());
    }

    #[test]
    fn test_fallback_verdict_shape() {
        let v = fallback_verdict();
        assert_eq!(v.decision, Decision::Review);
        assert_eq!(v.confidence, 0);
        assert_eq!(v.educational_value, 5);
        assert_eq!(v.concerns, vec!["ai_analysis_failed".to_string()]);
    }

    #[test]
    fn test_build_prompt_truncates_description() {
        let long_description = "x".repeat(DESCRIPTION_EXCERPT_CHARS + 100);
        let input = AnalysisInput {
            title: "Volcanoes explained",
            description: &long_description,
            channel_name: "Science Hour",
            duration_secs: 754,
            transcript: None,
        };
        let prompt = build_prompt(&input, 9, &test_prefs());
        assert!(prompt.contains("Volcanoes explained"));
        assert!(prompt.contains("12:34 (754 seconds)"));
        assert!(prompt.contains("Transcript: Not available"));
        assert!(!prompt.contains(&long_description));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
