use std::io::Cursor;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageOutputFormat};
use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::lock;
use crate::error::{PipelineError, PipelineResult};
use crate::ident;
use crate::notify::{DownloadSink, Notifier, SavedFile};
use crate::transport::{send_cancellable, HttpRequest, HttpTransport};
use crate::view::{PageView, LABEL_DOWNLOADING};

pub const DOWNLOAD_ID_LENGTH: usize = 8;
pub const BLOCKED_DOWNLOAD_MESSAGE: &str = "Direct download blocked by browser. Opening in new tab - please right click and \"Save As\".";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadTier {
    Primary,
    RenderedImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Saved { file: SavedFile, tier: DownloadTier },
    OpenedExternally { url: String },
    NothingPending,
    /// A reset happened while the download was running.
    Cancelled,
}

/// Best-effort download of the armed result: direct fetch, then the
/// rendered image, then handing the URL to the user.
pub struct DownloadHandler {
    transport: Arc<dyn HttpTransport>,
    sink: Arc<dyn DownloadSink>,
    notifier: Arc<dyn Notifier>,
    prefix: String,
    video_hint: Regex,
}

impl DownloadHandler {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        sink: Arc<dyn DownloadSink>,
        notifier: Arc<dyn Notifier>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            sink,
            notifier,
            prefix: prefix.into(),
            video_hint: Regex::new(r"(?i)\.(mp4|webm)").expect("valid regex"),
        }
    }

    pub fn extension_for(&self, content_type: &str, url: &str) -> &'static str {
        if content_type.contains("video") || self.video_hint.is_match(url) {
            "mp4"
        } else if content_type.contains("png") {
            "png"
        } else if content_type.contains("webp") {
            "webp"
        } else {
            "jpg"
        }
    }

    fn file_name(&self, extension: &str) -> String {
        format!(
            "{}_{}.{extension}",
            self.prefix,
            ident::generate(DOWNLOAD_ID_LENGTH)
        )
    }

    pub async fn download(
        &self,
        view: &Mutex<PageView>,
        cancel: &CancellationToken,
    ) -> DownloadOutcome {
        let url = match lock(view).download.pending_url.clone() {
            Some(url) if !url.is_empty() => url,
            _ => return DownloadOutcome::NothingPending,
        };
        let _restore = ControlRestore::engage(view, &url);

        match self.fetch_and_save(&url, cancel).await {
            Ok(file) => {
                return DownloadOutcome::Saved {
                    file,
                    tier: DownloadTier::Primary,
                }
            }
            Err(err) if err.is_cancelled() => return DownloadOutcome::Cancelled,
            Err(err) => warn!(url = %url, error = %err, "direct download failed"),
        }
        if cancel.is_cancelled() {
            return DownloadOutcome::Cancelled;
        }

        if let Some(pixels) = rendered_image(view) {
            match self.save_rendered(&pixels).await {
                Ok(file) => {
                    return DownloadOutcome::Saved {
                        file,
                        tier: DownloadTier::RenderedImage,
                    }
                }
                Err(err) => warn!(error = %err, "rendered image fallback failed"),
            }
        }

        self.notifier.alert(BLOCKED_DOWNLOAD_MESSAGE);
        self.notifier.open_external(&url);
        DownloadOutcome::OpenedExternally { url }
    }

    /// Primary tier on its own, without touching any view.
    pub async fn fetch_and_save(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<SavedFile> {
        let request = HttpRequest::get(url);
        let response = send_cancellable(self.transport.as_ref(), request, cancel).await?;
        if !response.is_success() {
            return Err(PipelineError::Transport(format!(
                "Fetch failed: {} {}",
                response.status,
                response.status_text()
            )));
        }
        let content_type = response.content_type.as_deref().unwrap_or_default();
        let file_name = self.file_name(self.extension_for(content_type, url));
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let saved = self.sink.save(&file_name, &response.body).await?;
        info!(file = %saved.file_name, bytes = saved.bytes, "result downloaded");
        Ok(saved)
    }

    async fn save_rendered(&self, pixels: &DynamicImage) -> PipelineResult<SavedFile> {
        let mut encoded = Cursor::new(Vec::new());
        pixels
            .write_to(&mut encoded, ImageOutputFormat::Png)
            .map_err(|err| PipelineError::Transport(format!("png encoding failed: {err}")))?;
        let file_name = self.file_name("png");
        self.sink.save(&file_name, encoded.get_ref()).await
    }
}

/// Pixels of the visible, fully loaded image result.
fn rendered_image(view: &Mutex<PageView>) -> Option<DynamicImage> {
    let view = lock(view);
    let image = &view.result.image;
    if image.visible && !view.result.video_visible() {
        image.pixels.clone()
    } else {
        None
    }
}

/// Shows the busy label while alive; puts the original label and state back
/// on drop, but only while the same URL is still armed. A reset disarms it.
struct ControlRestore<'a> {
    view: &'a Mutex<PageView>,
    url: String,
    label: String,
    enabled: bool,
}

impl<'a> ControlRestore<'a> {
    fn engage(view: &'a Mutex<PageView>, url: &str) -> Self {
        let mut guard = lock(view);
        let restore = Self {
            view,
            url: url.to_string(),
            label: guard.download.label.clone(),
            enabled: guard.download.enabled,
        };
        guard.download.label = LABEL_DOWNLOADING.to_string();
        guard.download.enabled = false;
        restore
    }
}

impl Drop for ControlRestore<'_> {
    fn drop(&mut self) {
        let mut guard = lock(self.view);
        if guard.download.pending_url.as_deref() != Some(self.url.as_str()) {
            debug!(url = %self.url, "download control left as is");
            return;
        }
        guard.download.label = std::mem::take(&mut self.label);
        guard.download.enabled = self.enabled;
    }
}
