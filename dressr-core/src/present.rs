use image::DynamicImage;
use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::transport::{send_cancellable, HttpRequest, HttpTransport};
use crate::view::{PageView, VideoElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// Puts a result URL on the page and arms the download control.
pub struct ResultPresenter {
    video_pattern: Regex,
}

impl Default for ResultPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultPresenter {
    pub fn new() -> Self {
        Self {
            video_pattern: Regex::new(r"(?i)\.(mp4|webm)(\?.*)?$").expect("valid regex"),
        }
    }

    pub fn classify(&self, url: &str) -> MediaKind {
        if self.video_pattern.is_match(url) {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    pub fn present(&self, view: &mut PageView, url: &str) -> MediaKind {
        let kind = self.classify(url);
        view.empty_state_visible = false;
        view.result.container_visible = true;
        match kind {
            MediaKind::Video => {
                view.result.image.visible = false;
                let video = view.result.video.get_or_insert_with(|| VideoElement {
                    visible: false,
                    src: String::new(),
                    controls: true,
                    autoplay: true,
                    looped: true,
                });
                video.src = url.to_string();
                video.visible = true;
            }
            MediaKind::Image => {
                if let Some(video) = view.result.video.as_mut() {
                    video.visible = false;
                }
                let image = &mut view.result.image;
                image.visible = true;
                image.cross_origin_anonymous = true;
                image.set_src(url);
            }
        }
        debug!(url, ?kind, "result presented");
        kind
    }

    pub fn arm_download(&self, view: &mut PageView, url: &str) {
        view.download.pending_url = Some(url.to_string());
        view.download.enabled = true;
        view.download.visible = true;
    }
}

/// Fetches and decodes an image result, the way an image element loads its `src`.
pub async fn load_image(
    transport: &dyn HttpTransport,
    url: &str,
    cancel: &CancellationToken,
) -> PipelineResult<DynamicImage> {
    let response = send_cancellable(transport, HttpRequest::get(url), cancel).await?;
    if !response.is_success() {
        return Err(PipelineError::Transport(format!(
            "image request failed: {} {}",
            response.status,
            response.status_text()
        )));
    }
    image::load_from_memory(&response.body)
        .map_err(|err| PipelineError::Transport(format!("image decode failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_video_extensions_case_insensitively() {
        let presenter = ResultPresenter::new();
        assert_eq!(presenter.classify("https://cdn/out.mp4?x=1"), MediaKind::Video);
        assert_eq!(presenter.classify("https://cdn/out.MP4"), MediaKind::Video);
        assert_eq!(presenter.classify("https://cdn/out.webm"), MediaKind::Video);
        assert_eq!(presenter.classify("https://cdn/out.png"), MediaKind::Image);
        assert_eq!(
            presenter.classify("https://cdn/out.mp4.png"),
            MediaKind::Image
        );
    }

    #[test]
    fn image_result_hides_video_and_sets_cors() {
        let presenter = ResultPresenter::new();
        let mut view = PageView::default();
        presenter.present(&mut view, "https://cdn/r.mp4");
        presenter.present(&mut view, "https://cdn/r.png");
        assert!(view.result.image.visible);
        assert!(view.result.image.cross_origin_anonymous);
        assert_eq!(view.result.image.src.as_deref(), Some("https://cdn/r.png"));
        assert!(!view.result.video_visible());
        assert!(!view.empty_state_visible);
        assert!(view.result.container_visible);
    }

    #[test]
    fn video_element_is_reused() {
        let presenter = ResultPresenter::new();
        let mut view = PageView::default();
        presenter.present(&mut view, "https://cdn/a.mp4");
        presenter.present(&mut view, "https://cdn/b.webm");
        let video = view.result.video.as_ref().unwrap();
        assert_eq!(video.src, "https://cdn/b.webm");
        assert!(video.visible && video.controls && video.autoplay && video.looped);
        assert!(!view.result.image.visible);
    }

    #[test]
    fn arming_download_stores_url() {
        let presenter = ResultPresenter::new();
        let mut view = PageView::default();
        view.download.visible = false;
        presenter.arm_download(&mut view, "https://cdn/r.png");
        assert_eq!(
            view.download.pending_url.as_deref(),
            Some("https://cdn/r.png")
        );
        assert!(view.download.enabled && view.download.visible);
    }
}
