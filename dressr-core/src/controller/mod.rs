mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::EffectsConfig;
use crate::download::{DownloadHandler, DownloadOutcome};
use crate::error::{PipelineError, PipelineResult};
use crate::job::{GenerationJob, JobKind, JobPoller, JobSubmitter};
use crate::notify::{DownloadSink, Notifier};
use crate::present::{load_image, MediaKind, ResultPresenter};
use crate::transport::HttpTransport;
use crate::upload::{MediaUploader, RemoteAsset, UploadTarget};
use crate::view::{PageView, LABEL_READY, LABEL_RETRY, LABEL_SUBMITTING, LABEL_UPLOADING};

pub use state::{InvalidTransition, WorkflowEvent, WorkflowState};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of one user-triggered operation.
#[derive(Debug)]
pub enum StepOutcome<T> {
    Completed(T),
    /// The error was already shown to the user.
    Failed(PipelineError),
    /// A reset (or newer selection) superseded the operation.
    Cancelled,
    /// The current state does not accept the operation.
    Ignored(InvalidTransition),
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub job: GenerationJob,
    pub result_url: String,
    pub media: MediaKind,
}

struct Session {
    state: WorkflowState,
    asset: Option<RemoteAsset>,
    cancel: CancellationToken,
}

impl Session {
    fn transition(&mut self, event: WorkflowEvent) -> Result<WorkflowState, InvalidTransition> {
        let next = self.state.apply(event)?;
        self.state = next;
        if !next.holds_asset() {
            self.asset = None;
        }
        Ok(next)
    }
}

/// Drives upload → submit → poll → present and owns the workflow state.
///
/// Lock order is session before view; neither is held across an await.
pub struct PipelineController {
    transport: Arc<dyn HttpTransport>,
    notifier: Arc<dyn Notifier>,
    uploader: MediaUploader,
    submitter: JobSubmitter,
    poller: JobPoller,
    presenter: ResultPresenter,
    downloader: DownloadHandler,
    session: Mutex<Session>,
    view: Mutex<PageView>,
}

impl PipelineController {
    pub fn new(
        config: EffectsConfig,
        transport: Arc<dyn HttpTransport>,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn DownloadSink>,
    ) -> Self {
        let config = Arc::new(config);
        let downloader = DownloadHandler::new(
            Arc::clone(&transport),
            sink,
            Arc::clone(&notifier),
            config.download.filename_prefix.clone(),
        );
        Self {
            uploader: MediaUploader::new(Arc::clone(&transport), Arc::clone(&config)),
            submitter: JobSubmitter::new(Arc::clone(&transport), Arc::clone(&config)),
            poller: JobPoller::new(Arc::clone(&transport), Arc::clone(&config)),
            presenter: ResultPresenter::new(),
            downloader,
            transport,
            notifier,
            session: Mutex::new(Session {
                state: WorkflowState::Idle,
                asset: None,
                cancel: CancellationToken::new(),
            }),
            view: Mutex::new(PageView::default()),
        }
    }

    pub fn state(&self) -> WorkflowState {
        lock(&self.session).state
    }

    pub fn asset(&self) -> Option<RemoteAsset> {
        lock(&self.session).asset.clone()
    }

    pub fn view(&self) -> PageView {
        lock(&self.view).clone()
    }

    pub fn job_kind(&self) -> JobKind {
        self.submitter.kind()
    }

    pub async fn on_file_selected(&self, target: UploadTarget) -> StepOutcome<RemoteAsset> {
        let cancel = {
            let mut session = lock(&self.session);
            if let Err(invalid) = session.transition(WorkflowEvent::FileSelected) {
                warn!(state = %session.state, "file selection ignored");
                return StepOutcome::Ignored(invalid);
            }
            session.cancel.cancel();
            session.cancel = CancellationToken::new();
            let mut view = lock(&self.view);
            if target.is_image() {
                view.show_preview(format!(
                    "data:{};base64,{}",
                    target.content_type,
                    STANDARD.encode(&target.bytes)
                ));
            }
            view.action.enabled = false;
            view.set_status(LABEL_UPLOADING);
            session.cancel.clone()
        };

        info!(file = %target.name, content_type = %target.content_type, "upload started");
        let result = self.uploader.upload(&target, &cancel).await;

        let mut session = lock(&self.session);
        if cancel.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        match result {
            Ok(asset) => {
                self.advance(&mut session, WorkflowEvent::UploadSucceeded);
                session.asset = Some(asset.clone());
                let mut view = lock(&self.view);
                view.set_status(LABEL_READY);
                view.action.enabled = session.state.action_enabled();
                StepOutcome::Completed(asset)
            }
            Err(err) if err.is_cancelled() => StepOutcome::Cancelled,
            Err(err) => {
                self.advance(&mut session, WorkflowEvent::UploadFailed);
                {
                    let mut view = lock(&self.view);
                    view.hide_loading();
                    view.set_status(LABEL_RETRY);
                    view.action.enabled = session.state.action_enabled();
                }
                drop(session);
                self.report(&format!("Upload failed: {err}"));
                StepOutcome::Failed(err)
            }
        }
    }

    pub async fn on_generate_requested(&self) -> StepOutcome<GenerationResult> {
        let (asset_url, cancel) = {
            let mut session = lock(&self.session);
            if let Err(invalid) = session.transition(WorkflowEvent::GenerateRequested) {
                return StepOutcome::Ignored(invalid);
            }
            let Some(asset) = session.asset.clone() else {
                // holds_asset() guarantees this for Processing
                self.advance(&mut session, WorkflowEvent::Reset);
                return StepOutcome::Cancelled;
            };
            session.cancel = CancellationToken::new();
            let mut view = lock(&self.view);
            view.show_loading();
            view.result.container_visible = false;
            view.set_status(LABEL_SUBMITTING);
            (asset.url, session.cancel.clone())
        };

        let result = self.generate(&asset_url, &cancel).await;

        let mut session = lock(&self.session);
        if cancel.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        match result {
            Ok(generation) => {
                self.advance(&mut session, WorkflowEvent::GenerationSucceeded);
                let mut view = lock(&self.view);
                self.presenter.present(&mut view, &generation.result_url);
                self.presenter.arm_download(&mut view, &generation.result_url);
                view.set_status(LABEL_READY);
                view.hide_loading();
                view.action.enabled = session.state.action_enabled();
                info!(job_id = %generation.job.job_id, url = %generation.result_url, "result displayed");
                StepOutcome::Completed(generation)
            }
            Err(err) if err.is_cancelled() => StepOutcome::Cancelled,
            Err(err) => {
                self.advance(&mut session, WorkflowEvent::GenerationFailed);
                {
                    let mut view = lock(&self.view);
                    view.hide_loading();
                    view.empty_state_visible = true;
                    view.set_status(LABEL_RETRY);
                    view.action.enabled = session.state.action_enabled();
                }
                drop(session);
                self.report(&err.to_string());
                StepOutcome::Failed(err)
            }
        }
    }

    async fn generate(
        &self,
        asset_url: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<GenerationResult> {
        let job = self.submitter.submit(asset_url, cancel).await?;
        let status = self
            .poller
            .poll(&job, cancel, |progress| {
                if !cancel.is_cancelled() {
                    lock(&self.view).set_status(&progress.label());
                }
            })
            .await?;
        let result_url = status
            .result_url(job.kind)
            .ok_or(PipelineError::MissingResult)?
            .to_string();
        let media = self.presenter.classify(&result_url);
        Ok(GenerationResult {
            job,
            result_url,
            media,
        })
    }

    /// Cancels whatever is in flight and returns the page to its initial look.
    pub fn reset(&self) {
        let mut session = lock(&self.session);
        session.cancel.cancel();
        self.advance(&mut session, WorkflowEvent::Reset);
        lock(&self.view).clear();
        info!("workflow reset");
    }

    /// Runs the download for the armed result; a reset stops it without
    /// saving or touching the cleared view.
    pub async fn download(&self) -> DownloadOutcome {
        let cancel = lock(&self.session).cancel.clone();
        self.downloader.download(&self.view, &cancel).await
    }

    /// Loads the displayed image result so its pixels are available, as a
    /// rendering host would. Returns the natural size.
    pub async fn load_result_image(&self) -> PipelineResult<Option<(u32, u32)>> {
        let (src, cancel) = {
            let session = lock(&self.session);
            let view = lock(&self.view);
            match (&view.result.image.src, view.result.image.visible) {
                (Some(src), true) => (src.clone(), session.cancel.clone()),
                _ => return Ok(None),
            }
        };
        let pixels = load_image(self.transport.as_ref(), &src, &cancel).await?;
        let mut view = lock(&self.view);
        if view.result.image.src.as_deref() != Some(src.as_str()) {
            return Ok(None);
        }
        view.result.image.pixels = Some(pixels);
        Ok(view.result.image.natural_size())
    }

    fn advance(&self, session: &mut Session, event: WorkflowEvent) {
        if let Err(invalid) = session.transition(event) {
            warn!(error = %invalid, "unexpected workflow transition");
        }
    }

    fn report(&self, message: &str) {
        error!(message, "workflow error");
        self.notifier.alert(&format!("Error: {message}"));
    }
}
