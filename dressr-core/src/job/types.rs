use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProcessingMode;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Image,
    Video,
}

impl JobKind {
    pub fn endpoint(&self) -> &'static str {
        match self {
            JobKind::Image => ProcessingMode::ImageEffects.endpoint(),
            JobKind::Video => ProcessingMode::VideoEffects.endpoint(),
        }
    }

    /// Kind-specific result field consulted after the shared `mediaUrl`.
    pub fn result_field(&self) -> ResultField {
        match self {
            JobKind::Image => ResultField::Image,
            JobKind::Video => ResultField::Video,
        }
    }
}

impl From<ProcessingMode> for JobKind {
    fn from(mode: ProcessingMode) -> Self {
        match mode {
            ProcessingMode::ImageEffects => JobKind::Image,
            ProcessingMode::VideoEffects => JobKind::Video,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Image => f.write_str("image"),
            JobKind::Video => f.write_str("video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultField {
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerationJob {
    pub job_id: String,
    pub kind: JobKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Error)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobState::Failed | JobState::Error)
    }
}

/// One status report of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatus {
    #[serde(default)]
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl JobStatus {
    /// Error text reported by the service, if it sent a non-empty one.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(message) if message.is_empty() => None,
            Value::String(message) => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn result_url(&self, kind: JobKind) -> Option<&str> {
        self.result.as_ref()?.first()?.media_url_for(kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResultPayload {
    Many(Vec<ResultItem>),
    One(ResultItem),
}

impl ResultPayload {
    pub fn first(&self) -> Option<&ResultItem> {
        match self {
            ResultPayload::Many(items) => items.first(),
            ResultPayload::One(item) => Some(item),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

impl ResultItem {
    pub fn media_url_for(&self, kind: JobKind) -> Option<&str> {
        let specific = match kind.result_field() {
            ResultField::Image => self.image.as_deref(),
            ResultField::Video => self.video.as_deref(),
        };
        let usable = |url: &&str| !url.is_empty();
        self.media_url
            .as_deref()
            .filter(usable)
            .or_else(|| specific.filter(usable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(value: Value) -> JobStatus {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn unknown_status_is_not_terminal() {
        let parsed = status(json!({"status": "queued"}));
        assert_eq!(parsed.status, JobState::Unknown);
        assert!(!parsed.status.is_terminal());
        let missing = status(json!({}));
        assert_eq!(missing.status, JobState::Unknown);
    }

    #[test]
    fn result_url_prefers_media_url() {
        let parsed = status(json!({
            "status": "completed",
            "result": {"mediaUrl": "https://cdn/r.png", "image": "https://cdn/other.png"}
        }));
        assert_eq!(parsed.result_url(JobKind::Image), Some("https://cdn/r.png"));
    }

    #[test]
    fn result_url_uses_kind_specific_field() {
        let parsed = status(json!({
            "status": "completed",
            "result": [{"video": "https://cdn/r.mp4", "image": "https://cdn/thumb.jpg"}]
        }));
        assert_eq!(parsed.result_url(JobKind::Video), Some("https://cdn/r.mp4"));
        assert_eq!(
            parsed.result_url(JobKind::Image),
            Some("https://cdn/thumb.jpg")
        );
    }

    #[test]
    fn empty_media_url_falls_through_to_kind_field() {
        let parsed = status(json!({
            "status": "completed",
            "result": {"mediaUrl": "", "image": "https://cdn/r.png"}
        }));
        assert_eq!(parsed.result_url(JobKind::Image), Some("https://cdn/r.png"));
        let blank = status(json!({
            "status": "completed",
            "result": {"mediaUrl": "", "image": ""}
        }));
        assert_eq!(blank.result_url(JobKind::Image), None);
    }

    #[test]
    fn empty_or_missing_result_yields_none() {
        assert_eq!(
            status(json!({"status": "completed"})).result_url(JobKind::Image),
            None
        );
        assert_eq!(
            status(json!({"status": "completed", "result": []})).result_url(JobKind::Image),
            None
        );
        assert_eq!(
            status(json!({"status": "completed", "result": {"video": "x.mp4"}}))
                .result_url(JobKind::Image),
            None
        );
    }

    #[test]
    fn error_message_ignores_empty_strings() {
        assert_eq!(
            status(json!({"status": "failed", "error": ""})).error_message(),
            None
        );
        assert_eq!(
            status(json!({"status": "failed", "error": "face not found"})).error_message(),
            Some("face not found".to_string())
        );
        assert_eq!(
            status(json!({"status": "error", "error": {"code": 7}})).error_message(),
            Some("{\"code\":7}".to_string())
        );
    }
}
