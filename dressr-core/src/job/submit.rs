use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::EffectsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::transport::{send_cancellable, HttpRequest, HttpTransport, ACCEPT_JSON_OR_TEXT};

use super::types::{GenerationJob, JobKind};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageJobRequest {
    pub model: String,
    pub tool_type: String,
    pub effect_id: String,
    pub image_url: String,
    pub user_id: String,
    pub remove_watermark: bool,
    pub is_private: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoJobRequest {
    pub image_url: Vec<String>,
    pub effect_id: String,
    pub user_id: String,
    pub remove_watermark: bool,
    pub model: String,
    pub is_private: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum JobRequest {
    Image(ImageJobRequest),
    Video(VideoJobRequest),
}

impl JobRequest {
    pub fn for_asset(config: &EffectsConfig, asset_url: &str) -> Self {
        match JobKind::from(config.effect.mode) {
            JobKind::Image => JobRequest::Image(ImageJobRequest {
                model: config.effect.mode.as_str().to_string(),
                tool_type: config.effect.tool_type.clone(),
                effect_id: config.effect.effect_id.clone(),
                image_url: asset_url.to_string(),
                user_id: config.account.user_id.clone(),
                remove_watermark: true,
                is_private: true,
            }),
            JobKind::Video => JobRequest::Video(VideoJobRequest {
                image_url: vec![asset_url.to_string()],
                effect_id: config.effect.effect_id.clone(),
                user_id: config.account.user_id.clone(),
                remove_watermark: true,
                model: config.effect.mode.as_str().to_string(),
                is_private: true,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "jobId", default)]
    job_id: Option<Value>,
}

impl SubmitResponse {
    fn job_id(&self) -> Option<String> {
        match self.job_id.as_ref()? {
            Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

pub struct JobSubmitter {
    transport: Arc<dyn HttpTransport>,
    config: Arc<EffectsConfig>,
}

impl JobSubmitter {
    pub fn new(transport: Arc<dyn HttpTransport>, config: Arc<EffectsConfig>) -> Self {
        Self { transport, config }
    }

    pub fn kind(&self) -> JobKind {
        JobKind::from(self.config.effect.mode)
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoints.api_base.trim_end_matches('/'),
            self.kind().endpoint()
        )
    }

    pub async fn submit(
        &self,
        asset_url: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<GenerationJob> {
        let body = JobRequest::for_asset(&self.config, asset_url);
        let request = HttpRequest::post_json(self.endpoint(), &body)
            .map_err(|err| PipelineError::Submit(format!("Failed to encode job: {err}")))?
            .header("Accept", ACCEPT_JSON_OR_TEXT);
        let response = send_cancellable(self.transport.as_ref(), request, cancel).await?;
        if !response.is_success() {
            return Err(PipelineError::Submit(format!(
                "Failed to submit job: {}",
                response.status_text()
            )));
        }
        let job_id = response
            .json::<SubmitResponse>()
            .ok()
            .and_then(|parsed| parsed.job_id())
            .ok_or_else(|| PipelineError::Submit("Job response missing jobId".to_string()))?;
        let job = GenerationJob {
            job_id,
            kind: self.kind(),
        };
        info!(job_id = %job.job_id, kind = %job.kind, effect = %self.config.effect.effect_id, "job submitted");
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessingMode;
    use crate::testing::{ScriptedReply, ScriptedTransport};
    use crate::transport::HttpMethod;
    use serde_json::json;

    fn body_of(transport: &ScriptedTransport) -> Value {
        let request = transport.requests().pop().unwrap();
        serde_json::from_slice(request.body.as_deref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn image_mode_posts_flat_body() {
        let transport = Arc::new(ScriptedTransport::new().on(
            HttpMethod::Post,
            "/image-gen",
            vec![ScriptedReply::json(&json!({"jobId": "J1"}))],
        ));
        let submitter = JobSubmitter::new(transport.clone(), Arc::new(EffectsConfig::default()));
        let job = submitter
            .submit("https://assets.dressr.ai/media/a.jpg", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(job.job_id, "J1");
        assert_eq!(job.kind, JobKind::Image);

        let request = transport.requests().pop().unwrap();
        assert_eq!(request.url, "https://api.chromastudio.ai/image-gen");
        assert_eq!(
            request.header_value("Accept"),
            Some("application/json, text/plain, */*")
        );
        assert_eq!(
            body_of(&transport),
            json!({
                "model": "image-effects",
                "toolType": "image-effects",
                "effectId": "mugshot",
                "imageUrl": "https://assets.dressr.ai/media/a.jpg",
                "userId": "DObRu1vyStbUynoQmTcHBlhs55z2",
                "removeWatermark": true,
                "isPrivate": true
            })
        );
    }

    #[tokio::test]
    async fn video_mode_wraps_url_in_list() {
        let transport = Arc::new(ScriptedTransport::new().on(
            HttpMethod::Post,
            "/video-gen",
            vec![ScriptedReply::json(&json!({"jobId": 77}))],
        ));
        let config = EffectsConfig::default().with_mode(ProcessingMode::VideoEffects);
        let submitter = JobSubmitter::new(transport.clone(), Arc::new(config));
        let job = submitter
            .submit("https://assets/a.jpg", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(job.job_id, "77");
        assert_eq!(job.kind, JobKind::Video);
        assert_eq!(
            body_of(&transport),
            json!({
                "imageUrl": ["https://assets/a.jpg"],
                "effectId": "mugshot",
                "userId": "DObRu1vyStbUynoQmTcHBlhs55z2",
                "removeWatermark": true,
                "model": "video-effects",
                "isPrivate": true
            })
        );
    }

    #[tokio::test]
    async fn non_success_status_is_submit_error() {
        let transport = Arc::new(ScriptedTransport::new().on(
            HttpMethod::Post,
            "/image-gen",
            vec![ScriptedReply::status(429, "Too Many Requests")],
        ));
        let submitter = JobSubmitter::new(transport, Arc::new(EffectsConfig::default()));
        let err = submitter
            .submit("https://assets/a.jpg", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Submit(_)));
        assert_eq!(err.to_string(), "Failed to submit job: Too Many Requests");
    }

    #[tokio::test]
    async fn missing_job_id_is_rejected_before_polling() {
        let transport = Arc::new(ScriptedTransport::new().on(
            HttpMethod::Post,
            "/image-gen",
            vec![ScriptedReply::json(&json!({"status": "queued"}))],
        ));
        let submitter = JobSubmitter::new(transport, Arc::new(EffectsConfig::default()));
        let err = submitter
            .submit("https://assets/a.jpg", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Job response missing jobId");
    }
}
