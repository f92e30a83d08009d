//! Shared data models used across modules

use serde::{Deserialize, Serialize};

/// A classification decision for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Allow,
    Review,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Review => "REVIEW",
            Decision::Block => "BLOCK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ALLOW" => Some(Decision::Allow),
            "REVIEW" => Some(Decision::Review),
            "BLOCK" => Some(Decision::Block),
            _ => None,
        }
    }
}

/// How strongly the parent weights educational content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EducationalPriority {
    High,
    Medium,
    Low,
}

impl EducationalPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            EducationalPriority::High => "high",
            EducationalPriority::Medium => "medium",
            EducationalPriority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(EducationalPriority::High),
            "medium" => Some(EducationalPriority::Medium),
            "low" => Some(EducationalPriority::Low),
            _ => None,
        }
    }
}

/// A structured classification result for one video.
///
/// Either produced by the external classifier or synthesized as a fallback
/// when the classifier fails; `AnalysisOutcome` tells the two apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub decision: Decision,
    /// 0-100
    pub confidence: i32,
    pub category: String,
    /// 0-10
    pub educational_value: i32,
    pub concerns: Vec<String>,
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_round_trip() {
        for d in [Decision::Allow, Decision::Review, Decision::Block] {
            assert_eq!(Decision::parse(d.as_str()), Some(d));
        }
        assert_eq!(Decision::parse("MAYBE"), None);
        assert_eq!(Decision::parse("allow"), None);
    }

    #[test]
    fn test_decision_serde_uses_wire_names() {
        let json = serde_json::to_string(&Decision::Block).unwrap();
        assert_eq!(json, "\"BLOCK\"");
        let parsed: Decision = serde_json::from_str("\"REVIEW\"").unwrap();
        assert_eq!(parsed, Decision::Review);
    }

    #[test]
    fn test_priority_round_trip() {
        for p in [
            EducationalPriority::High,
            EducationalPriority::Medium,
            EducationalPriority::Low,
        ] {
            assert_eq!(EducationalPriority::parse(p.as_str()), Some(p));
        }
        assert_eq!(EducationalPriority::parse("urgent"), None);
    }
}
