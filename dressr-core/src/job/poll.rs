use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::EffectsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::transport::{send_cancellable, HttpRequest, HttpTransport, ACCEPT_JSON_OR_TEXT};

use super::types::{GenerationJob, JobState, JobStatus};

/// Share of the poll budget already spent; not the job's real progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollProgress {
    pub attempt: u32,
    pub max_attempts: u32,
    pub percent: u32,
}

impl PollProgress {
    fn new(attempt: u32, max_attempts: u32) -> Self {
        let percent = ((attempt as f64 / max_attempts as f64) * 100.0).round() as u32;
        Self {
            attempt,
            max_attempts,
            percent,
        }
    }

    pub fn label(&self) -> String {
        format!("PROCESSING... ({}%)", self.percent)
    }
}

pub struct JobPoller {
    transport: Arc<dyn HttpTransport>,
    config: Arc<EffectsConfig>,
    interval: Duration,
    max_attempts: u32,
}

impl JobPoller {
    pub fn new(transport: Arc<dyn HttpTransport>, config: Arc<EffectsConfig>) -> Self {
        let interval = config.polling.interval();
        let max_attempts = config.polling.max_attempts.max(1);
        Self {
            transport,
            config,
            interval,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `<api_base>/<gen>/<user>/<job>/status`, each id pushed as one encoded segment.
    pub fn status_url(&self, job: &GenerationJob) -> PipelineResult<String> {
        let invalid = || PipelineError::Poll("invalid status endpoint".to_string());
        let mut url = Url::parse(&self.config.endpoints.api_base).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend([
                job.kind.endpoint(),
                self.config.account.user_id.as_str(),
                job.job_id.as_str(),
                "status",
            ]);
        Ok(url.to_string())
    }

    /// Polls until the job reaches a terminal status or the budget runs out.
    ///
    /// Any non-2xx status response aborts immediately. `on_progress` fires
    /// once per non-terminal report, before the wait.
    pub async fn poll<F>(
        &self,
        job: &GenerationJob,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> PipelineResult<JobStatus>
    where
        F: FnMut(PollProgress),
    {
        let url = self.status_url(job)?;
        for attempt in 0..self.max_attempts {
            let request = HttpRequest::get(url.clone()).header("Accept", ACCEPT_JSON_OR_TEXT);
            let response = send_cancellable(self.transport.as_ref(), request, cancel).await?;
            if !response.is_success() {
                warn!(job_id = %job.job_id, status = response.status, "status check rejected");
                return Err(PipelineError::Poll("Failed to check status".to_string()));
            }
            let status: JobStatus = response.json().map_err(|err| {
                PipelineError::Poll(format!("Failed to read job status: {err}"))
            })?;

            match status.status {
                JobState::Completed => {
                    info!(job_id = %job.job_id, attempts = attempt + 1, "job completed");
                    return Ok(status);
                }
                state if state.is_failure() => {
                    let message = status
                        .error_message()
                        .unwrap_or_else(|| "Job processing failed".to_string());
                    return Err(PipelineError::Job(message));
                }
                state => {
                    let progress = PollProgress::new(attempt, self.max_attempts);
                    debug!(job_id = %job.job_id, ?state, attempt, percent = progress.percent, "job still running");
                    on_progress(progress);
                }
            }

            if attempt + 1 < self.max_attempts {
                wait(self.interval, cancel).await?;
            }
        }
        warn!(job_id = %job.job_id, attempts = self.max_attempts, "poll budget exhausted");
        Err(PipelineError::Timeout)
    }
}

async fn wait(interval: Duration, cancel: &CancellationToken) -> PipelineResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        _ = sleep(interval) => Ok(()),
    }
}
