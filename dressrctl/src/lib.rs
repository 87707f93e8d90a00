use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dressr_core::job::JobState;
use dressr_core::{
    ident, load_effects_config, DirectorySink, DownloadHandler, DownloadOutcome, EffectsConfig,
    GenerationJob, HttpTransport, JobKind, JobPoller, JobSubmitter, MediaKind, MediaUploader,
    Notifier, PipelineController, PipelineError, ProcessingMode, ReqwestTransport, SavedFile,
    StepOutcome, UploadTarget,
};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] dressr_core::ConfigError),
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("interrupted")]
    Interrupted,
    #[error("workflow refused the request: {0}")]
    Refused(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run hosted image and video effects from the terminal", long_about = None)]
pub struct Cli {
    /// Path to dressr.toml; compiled defaults are used when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Overrides effect.mode (image-effects or video-effects)
    #[arg(long)]
    pub mode: Option<ProcessingMode>,
    /// Overrides effect.effect_id
    #[arg(long)]
    pub effect: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Debug-level logging (RUST_LOG is ignored)
    #[arg(long, default_value_t = false)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file, run the effect and download the result
    Run(RunArgs),
    /// Upload a file and print its public URL
    Upload(UploadArgs),
    /// Submit a job for an already uploaded asset
    Submit(SubmitArgs),
    /// Poll a job until it finishes
    Poll(PollArgs),
    /// Download a result URL
    Download(DownloadArgs),
    /// Print a random alphanumeric identifier
    Id(IdArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    pub file: PathBuf,
    /// Directory receiving the downloaded result
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Stop after displaying the result
    #[arg(long, default_value_t = false)]
    pub no_download: bool,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    pub asset_url: String,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    pub job_id: String,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    pub url: String,
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    #[arg(long, default_value_t = ident::DEFAULT_ID_LENGTH)]
    pub length: usize,
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.debug);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Id(args) => render(
            &IdReport {
                id: ident::generate(args.length),
            },
            cli.format,
        ),
        Commands::Config => render(&config, cli.format),
        command => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(execute(command, config, cli.format))
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<EffectsConfig> {
    let mut config = match &cli.config {
        Some(path) => load_effects_config(path)?,
        None => EffectsConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config = config.with_mode(mode);
    }
    if let Some(effect) = &cli.effect {
        config = config.with_effect(effect.clone());
    }
    Ok(config)
}

async fn execute(command: &Commands, config: EffectsConfig, format: OutputFormat) -> Result<()> {
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    match command {
        Commands::Run(args) => {
            let controller = Arc::new(PipelineController::new(
                config,
                transport,
                Arc::new(TerminalNotifier),
                Arc::new(DirectorySink::new(&args.output_dir)),
            ));
            let target = UploadTarget::from_path(&args.file).await?;
            let interrupt = {
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupted, resetting workflow");
                        controller.reset();
                    }
                })
            };
            let report = run_workflow(&controller, target, !args.no_download).await;
            interrupt.abort();
            render(&report?, format)
        }
        Commands::Upload(args) => {
            let cancel = interrupt_token();
            let target = UploadTarget::from_path(&args.file).await?;
            let asset = MediaUploader::new(transport, Arc::new(config))
                .upload(&target, &cancel)
                .await
                .map_err(interrupted)?;
            render(&UploadReport { asset_url: asset.url }, format)
        }
        Commands::Submit(args) => {
            let cancel = interrupt_token();
            let job = JobSubmitter::new(transport, Arc::new(config))
                .submit(&args.asset_url, &cancel)
                .await
                .map_err(interrupted)?;
            render(&job, format)
        }
        Commands::Poll(args) => {
            let cancel = interrupt_token();
            let report = poll_job(transport, config, &args.job_id, &cancel).await?;
            render(&report, format)
        }
        Commands::Download(args) => {
            let prefix = config.download.filename_prefix.clone();
            let handler = DownloadHandler::new(
                transport,
                Arc::new(DirectorySink::new(&args.output_dir)),
                Arc::new(TerminalNotifier),
                prefix,
            );
            let cancel = interrupt_token();
            let saved = handler
                .fetch_and_save(&args.url, &cancel)
                .await
                .map_err(interrupted)?;
            render(&saved, format)
        }
        Commands::Id(_) | Commands::Config => Ok(()),
    }
}

/// Drives the controller the way a user would: pick the file, press the
/// action control, then the download control.
pub async fn run_workflow(
    controller: &PipelineController,
    target: UploadTarget,
    download: bool,
) -> Result<RunReport> {
    let asset = completed(controller.on_file_selected(target).await)?;
    let generation = completed(controller.on_generate_requested().await)?;

    let download = if download {
        if generation.media == MediaKind::Image {
            if let Err(err) = controller.load_result_image().await {
                warn!(error = %err, "result image did not load");
            }
        }
        match controller.download().await {
            DownloadOutcome::Cancelled => return Err(AppError::Interrupted),
            outcome => Some(outcome),
        }
    } else {
        None
    };

    Ok(RunReport {
        asset_url: asset.url,
        job_id: generation.job.job_id,
        result_url: generation.result_url,
        media: generation.media,
        download,
    })
}

pub async fn poll_job(
    transport: Arc<dyn HttpTransport>,
    config: EffectsConfig,
    job_id: &str,
    cancel: &CancellationToken,
) -> Result<PollReport> {
    let job = GenerationJob {
        job_id: job_id.to_string(),
        kind: JobKind::from(config.effect.mode),
    };
    let poller = JobPoller::new(transport, Arc::new(config));
    let status = poller
        .poll(&job, cancel, |progress| {
            info!(attempt = progress.attempt, "{}", progress.label());
        })
        .await
        .map_err(interrupted)?;
    let result_url = status
        .result_url(job.kind)
        .ok_or(PipelineError::MissingResult)?
        .to_string();
    Ok(PollReport {
        job_id: job.job_id,
        status: status.status,
        result_url,
    })
}

fn completed<T>(outcome: StepOutcome<T>) -> Result<T> {
    match outcome {
        StepOutcome::Completed(value) => Ok(value),
        StepOutcome::Failed(err) => Err(err.into()),
        StepOutcome::Cancelled => Err(AppError::Interrupted),
        StepOutcome::Ignored(invalid) => Err(AppError::Refused(invalid.to_string())),
    }
}

fn interrupted(err: PipelineError) -> AppError {
    if err.is_cancelled() {
        AppError::Interrupted
    } else {
        AppError::Pipeline(err)
    }
}

/// Cancelled when the process receives Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

/// Alerts go to stderr; URLs to open are printed for the user to follow.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn alert(&self, message: &str) {
        eprintln!("[alert] {message}");
    }

    fn open_external(&self, url: &str) {
        eprintln!("[open] {url}");
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub asset_url: String,
    pub job_id: String,
    pub result_url: String,
    pub media: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadOutcome>,
}

#[derive(Debug, Serialize)]
pub struct UploadReport {
    pub asset_url: String,
}

#[derive(Debug, Serialize)]
pub struct PollReport {
    pub job_id: String,
    pub status: JobState,
    pub result_url: String,
}

#[derive(Debug, Serialize)]
pub struct IdReport {
    pub id: String,
}

impl DisplayFallback for RunReport {
    fn display(&self) -> String {
        let media = match self.media {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        };
        let mut lines = vec![
            format!("asset:  {}", self.asset_url),
            format!("job:    {}", self.job_id),
            format!("result: {} ({media})", self.result_url),
        ];
        match &self.download {
            Some(DownloadOutcome::Saved { file, .. }) => {
                lines.push(format!("saved:  {} ({} bytes)", file.location, file.bytes))
            }
            Some(DownloadOutcome::OpenedExternally { url }) => {
                lines.push(format!("download blocked, open manually: {url}"))
            }
            Some(DownloadOutcome::NothingPending | DownloadOutcome::Cancelled) | None => {}
        }
        lines.join("\n")
    }
}

impl DisplayFallback for UploadReport {
    fn display(&self) -> String {
        self.asset_url.clone()
    }
}

impl DisplayFallback for GenerationJob {
    fn display(&self) -> String {
        format!("{} ({})", self.job_id, self.kind)
    }
}

impl DisplayFallback for PollReport {
    fn display(&self) -> String {
        self.result_url.clone()
    }
}

impl DisplayFallback for SavedFile {
    fn display(&self) -> String {
        format!("{} ({} bytes)", self.location, self.bytes)
    }
}

impl DisplayFallback for IdReport {
    fn display(&self) -> String {
        self.id.clone()
    }
}

impl DisplayFallback for EffectsConfig {
    fn display(&self) -> String {
        [
            format!("account.user_id          = {}", self.account.user_id),
            format!("account.project_id       = {}", self.account.project_id),
            format!("effect.effect_id         = {}", self.effect.effect_id),
            format!("effect.mode              = {}", self.effect.mode),
            format!("effect.tool_type         = {}", self.effect.tool_type),
            format!("endpoints.api_base       = {}", self.endpoints.api_base),
            format!("endpoints.upload_base    = {}", self.endpoints.upload_base),
            format!("endpoints.assets_base    = {}", self.endpoints.assets_base),
            format!("polling.interval_ms      = {}", self.polling.interval_ms),
            format!("polling.max_attempts     = {}", self.polling.max_attempts),
            format!("download.filename_prefix = {}", self.download.filename_prefix),
        ]
        .join("\n")
    }
}
