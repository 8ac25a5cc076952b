//! Classification gateway — the only seam to the hosted inference
//! capability. Callers treat every failure (transport error, timeout,
//! malformed result) the same way: fall back locally, never abort the batch.

use std::collections::HashMap;
use std::time::Duration;

use ai_client::Claude;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use citypulse_common::RawEvent;

/// Default bound on a single classification call.
pub const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(20);
/// Default bound on a single summarization call.
pub const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Task vocabulary sent with every classification call. Downstream model
/// routing keys on these strings, so the wire form is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskLabel {
    SimilarityCheck,
    ContentAnalysis,
    SentimentAnalysis,
    LocationInference,
    SeverityAssessment,
    MediaAnalysis,
    InsightGeneration,
    EventSynthesis,
}

impl std::fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskLabel::SimilarityCheck => write!(f, "SIMILARITY_CHECK"),
            TaskLabel::ContentAnalysis => write!(f, "CONTENT_ANALYSIS"),
            TaskLabel::SentimentAnalysis => write!(f, "SENTIMENT_ANALYSIS"),
            TaskLabel::LocationInference => write!(f, "LOCATION_INFERENCE"),
            TaskLabel::SeverityAssessment => write!(f, "SEVERITY_ASSESSMENT"),
            TaskLabel::MediaAnalysis => write!(f, "MEDIA_ANALYSIS"),
            TaskLabel::InsightGeneration => write!(f, "INSIGHT_GENERATION"),
            TaskLabel::EventSynthesis => write!(f, "EVENT_SYNTHESIS"),
        }
    }
}

/// One classification result: an open field map plus an overall confidence.
/// A missing confidence is treated as low-confidence by callers, never as 1.0.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub fields: HashMap<String, Value>,
    pub confidence: Option<f32>,
}

impl Classification {
    pub fn with_confidence(confidence: f32) -> Self {
        Self {
            fields: HashMap::new(),
            confidence: Some(confidence),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait ClassificationGateway: Send + Sync {
    /// One inference call. `task` selects the downstream behavior; the
    /// result is a field map whose keys depend on the task.
    async fn classify(&self, text: &str, task: TaskLabel) -> Result<Classification>;

    /// Condense a cluster of raw reports into one summary text.
    async fn summarize(&self, events: &[RawEvent], context: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// ClaudeGateway
// ---------------------------------------------------------------------------

/// Structured response shape shared by all classify tasks. Null fields are
/// dropped before the map reaches the caller.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct ClassifyResponse {
    /// Event category, e.g. TRAFFIC or CIVIC_ISSUE. Null when not asked for.
    category: Option<String>,
    /// One of LOW, MODERATE, HIGH, CRITICAL.
    severity: Option<String>,
    /// One of positive, neutral, negative, mixed.
    sentiment: Option<String>,
    /// Sentiment intensity in [0,1].
    sentiment_score: Option<f32>,
    /// Neighborhood or area name.
    location_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    keywords: Option<Vec<String>>,
    /// Free-text summary or description.
    summary: Option<String>,
    /// Overall confidence in [0,1].
    confidence: Option<f32>,
}

impl From<ClassifyResponse> for Classification {
    fn from(resp: ClassifyResponse) -> Self {
        let confidence = resp.confidence;
        let fields = match serde_json::to_value(&resp) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter(|(k, v)| !v.is_null() && k != "confidence")
                .collect(),
            _ => HashMap::new(),
        };
        Self { fields, confidence }
    }
}

pub struct ClaudeGateway {
    claude: Claude,
    classify_timeout: Duration,
    summarize_timeout: Duration,
}

impl ClaudeGateway {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(api_key, model),
            classify_timeout: CLASSIFY_TIMEOUT,
            summarize_timeout: SUMMARIZE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, classify: Duration, summarize: Duration) -> Self {
        self.classify_timeout = classify;
        self.summarize_timeout = summarize;
        self
    }

    fn system_prompt(task: TaskLabel) -> &'static str {
        match task {
            TaskLabel::SimilarityCheck => {
                "You compare two city event reports and judge whether they describe \
                 the same real-world occurrence. Set confidence to your probability \
                 that they are the same event. Leave all other fields null."
            }
            TaskLabel::ContentAnalysis => {
                "You classify a city event report. Infer its category (one of \
                 TRAFFIC, CIVIC_ISSUE, EMERGENCY, WEATHER, INFRASTRUCTURE, \
                 CULTURAL_EVENT, SAFETY, COMMUNITY), a short keyword list, and a \
                 one-sentence summary."
            }
            TaskLabel::SentimentAnalysis => {
                "You assess the sentiment of a city event report from the \
                 perspective of affected residents. Set sentiment to positive, \
                 neutral, negative, or mixed, and sentiment_score to its intensity."
            }
            TaskLabel::LocationInference => {
                "You extract location detail from a city event report. Set \
                 location_name to the most specific neighborhood or area mentioned, \
                 and latitude/longitude when the place is unambiguous."
            }
            TaskLabel::SeverityAssessment => {
                "You rate how severely a city event impacts residents. Set severity \
                 to one of LOW, MODERATE, HIGH, CRITICAL."
            }
            TaskLabel::MediaAnalysis => {
                "You describe what the referenced media shows about a city event. \
                 Set summary to a short factual description of the media content."
            }
            TaskLabel::InsightGeneration => {
                "You surface additional insights about a city event: set keywords \
                 to notable entities and themes, and summary to anything actionable \
                 the structured fields miss."
            }
            TaskLabel::EventSynthesis => {
                "You condense multiple reports of the same city event into one \
                 clear description."
            }
        }
    }
}

#[async_trait]
impl ClassificationGateway for ClaudeGateway {
    async fn classify(&self, text: &str, task: TaskLabel) -> Result<Classification> {
        debug!(%task, chars = text.len(), "Classification call");

        let user_prompt = format!("Task: {task}\n\n{text}");
        let response: ClassifyResponse = tokio::time::timeout(
            self.classify_timeout,
            self.claude.extract(Self::system_prompt(task), user_prompt),
        )
        .await
        .map_err(|_| anyhow!("{task} call timed out after {:?}", self.classify_timeout))??;

        Ok(response.into())
    }

    async fn summarize(&self, events: &[RawEvent], context: &str) -> Result<String> {
        let descriptions: Vec<String> = events
            .iter()
            .take(20)
            .map(|e| {
                let detail = e.description.as_deref().unwrap_or("");
                format!("- {}: {}", e.title, detail)
            })
            .collect();

        let prompt = format!(
            "Context: {context}\n\nReports:\n{}\n\nWrite a concise synthesis of these \
             reports as a single event description. Start with a short headline line, \
             then two or three sentences of detail.",
            descriptions.join("\n"),
        );

        let text = tokio::time::timeout(
            self.summarize_timeout,
            self.claude.chat_completion(
                Self::system_prompt(TaskLabel::EventSynthesis),
                prompt,
            ),
        )
        .await
        .map_err(|_| {
            anyhow!(
                "{} call timed out after {:?}",
                TaskLabel::EventSynthesis,
                self.summarize_timeout
            )
        })??;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_label_wire_forms() {
        assert_eq!(TaskLabel::SimilarityCheck.to_string(), "SIMILARITY_CHECK");
        assert_eq!(TaskLabel::SeverityAssessment.to_string(), "SEVERITY_ASSESSMENT");
        assert_eq!(
            serde_json::to_string(&TaskLabel::InsightGeneration).unwrap(),
            "\"INSIGHT_GENERATION\""
        );
    }

    #[test]
    fn classification_drops_null_fields() {
        let resp = ClassifyResponse {
            category: Some("TRAFFIC".to_string()),
            severity: None,
            sentiment: None,
            sentiment_score: None,
            location_name: None,
            latitude: None,
            longitude: None,
            keywords: Some(vec!["jam".to_string()]),
            summary: None,
            confidence: Some(0.8),
        };
        let c: Classification = resp.into();
        assert_eq!(c.str_field("category"), Some("TRAFFIC"));
        assert_eq!(c.string_list("keywords"), vec!["jam".to_string()]);
        assert!(!c.fields.contains_key("severity"));
        assert!(!c.fields.contains_key("confidence"));
        assert_eq!(c.confidence, Some(0.8));
    }

    #[test]
    fn classification_builder_helpers() {
        let c = Classification::with_confidence(0.9)
            .field("severity", "HIGH")
            .field("latitude", 12.93);
        assert_eq!(c.str_field("severity"), Some("HIGH"));
        assert_eq!(c.f64_field("latitude"), Some(12.93));
        assert!(c.string_list("keywords").is_empty());
    }
}
