pub mod config;
pub mod controller;
pub mod download;
pub mod error;
pub mod ident;
pub mod job;
pub mod notify;
pub mod present;
pub mod testing;
pub mod transport;
pub mod upload;
pub mod view;

pub use config::{
    load_effects_config, AccountSection, DownloadSection, EffectSection, EffectsConfig,
    EndpointsSection, PollingSection, ProcessingMode,
};
pub use controller::{
    GenerationResult, InvalidTransition, PipelineController, StepOutcome, WorkflowEvent,
    WorkflowState,
};
pub use download::{DownloadHandler, DownloadOutcome, DownloadTier};
pub use error::{ConfigError, PipelineError, PipelineResult, Result};
pub use job::{
    GenerationJob, JobKind, JobPoller, JobState, JobStatus, JobSubmitter, PollProgress,
};
pub use notify::{DirectorySink, DownloadSink, Notifier, SavedFile};
pub use present::{MediaKind, ResultPresenter};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use upload::{MediaUploader, RemoteAsset, UploadTarget};
pub use view::PageView;
