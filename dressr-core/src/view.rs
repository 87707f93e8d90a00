//! In-memory model of the page the workflow drives.

use image::{DynamicImage, GenericImageView};
use serde::Serialize;

pub const LABEL_READY: &str = "PROCESS EVIDENCE";
pub const LABEL_UPLOADING: &str = "UPLOADING...";
pub const LABEL_SUBMITTING: &str = "SUBMITTING JOB...";
pub const LABEL_RETRY: &str = "TRY AGAIN";
pub const LABEL_DOWNLOAD: &str = "Download";
pub const LABEL_DOWNLOADING: &str = "Downloading...";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionControl {
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DownloadControl {
    pub label: String,
    pub enabled: bool,
    pub visible: bool,
    pub pending_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PreviewPane {
    pub visible: bool,
    /// `data:` URL of the locally selected image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImageElement {
    pub visible: bool,
    pub src: Option<String>,
    pub cross_origin_anonymous: bool,
    /// Decoded pixels once the image finished loading.
    #[serde(skip)]
    pub pixels: Option<DynamicImage>,
}

impl ImageElement {
    pub fn set_src(&mut self, src: &str) {
        self.src = Some(src.to_string());
        self.pixels = None;
    }

    pub fn is_complete(&self) -> bool {
        self.pixels.is_some()
    }

    pub fn natural_size(&self) -> Option<(u32, u32)> {
        self.pixels.as_ref().map(|pixels| pixels.dimensions())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VideoElement {
    pub visible: bool,
    pub src: String,
    pub controls: bool,
    pub autoplay: bool,
    pub looped: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultPane {
    pub container_visible: bool,
    pub image: ImageElement,
    /// Created on the first video result and reused afterwards.
    pub video: Option<VideoElement>,
}

impl ResultPane {
    pub fn video_visible(&self) -> bool {
        self.video.as_ref().map(|video| video.visible).unwrap_or(false)
    }

    fn hide_media(&mut self) {
        self.image.visible = false;
        if let Some(video) = self.video.as_mut() {
            video.visible = false;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub action: ActionControl,
    pub download: DownloadControl,
    pub upload_prompt_visible: bool,
    pub preview: PreviewPane,
    pub empty_state_visible: bool,
    pub loading_visible: bool,
    pub loading_text: String,
    pub result: ResultPane,
}

impl Default for PageView {
    fn default() -> Self {
        Self {
            action: ActionControl {
                label: LABEL_READY.to_string(),
                enabled: false,
            },
            download: DownloadControl {
                label: LABEL_DOWNLOAD.to_string(),
                enabled: false,
                visible: true,
                pending_url: None,
            },
            upload_prompt_visible: true,
            preview: PreviewPane::default(),
            empty_state_visible: true,
            loading_visible: false,
            loading_text: String::new(),
            result: ResultPane::default(),
        }
    }
}

impl PageView {
    /// Action label; progress texts (those with `...`) also go to the loading overlay.
    pub fn set_status(&mut self, text: &str) {
        self.action.label = text.to_string();
        if text.contains("...") {
            self.loading_text = text.to_string();
        }
    }

    pub fn show_preview(&mut self, data_url: String) {
        self.preview.source = Some(data_url);
        self.preview.visible = true;
        self.upload_prompt_visible = false;
    }

    pub fn show_loading(&mut self) {
        self.loading_visible = true;
        self.empty_state_visible = false;
        self.result.hide_media();
        self.download.visible = false;
        self.action.enabled = false;
    }

    pub fn hide_loading(&mut self) {
        self.loading_visible = false;
    }

    /// Back to the initial page. The lazily created video element survives, hidden.
    pub fn clear(&mut self) {
        let video = self.result.video.take().map(|mut video| {
            video.visible = false;
            video
        });
        *self = PageView::default();
        self.result.video = video;
    }
}
