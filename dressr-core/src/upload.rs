use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::config::EffectsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::ident;
use crate::transport::{send_cancellable, HttpRequest, HttpTransport};

pub const DEFAULT_EXTENSION: &str = "jpg";

/// A local file picked for upload.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadTarget {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub async fn from_path<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| PipelineError::Io {
                source,
                path: path.to_path_buf(),
            })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = content_type_for(&name).to_string();
        Ok(Self::new(name, content_type, bytes))
    }

    /// Text after the last dot of the name, `jpg` when there is none.
    pub fn extension(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext,
            _ => DEFAULT_EXTENSION,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Storage key for an upload: `media/<id>.<ext>`.
pub fn upload_file_name(target: &UploadTarget, id: &str) -> String {
    format!("media/{id}.{}", target.extension())
}

/// Publicly fetchable location of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteAsset {
    pub url: String,
}

pub struct MediaUploader {
    transport: Arc<dyn HttpTransport>,
    config: Arc<EffectsConfig>,
}

impl MediaUploader {
    pub fn new(transport: Arc<dyn HttpTransport>, config: Arc<EffectsConfig>) -> Self {
        Self { transport, config }
    }

    pub fn signed_url_endpoint(&self, file_name: &str) -> PipelineResult<String> {
        let base = self.config.endpoints.upload_base.trim_end_matches('/');
        let url = Url::parse_with_params(
            &format!("{base}/get-upload-url"),
            &[
                ("fileName", file_name),
                ("projectId", self.config.account.project_id.as_str()),
            ],
        )
        .map_err(|err| PipelineError::Upload(format!("invalid upload endpoint: {err}")))?;
        Ok(url.to_string())
    }

    pub fn asset_url(&self, file_name: &str) -> String {
        format!(
            "{}/{file_name}",
            self.config.endpoints.assets_base.trim_end_matches('/')
        )
    }

    /// Single attempt: signed URL, then PUT, then derive the asset URL.
    pub async fn upload(
        &self,
        target: &UploadTarget,
        cancel: &CancellationToken,
    ) -> PipelineResult<RemoteAsset> {
        let file_name = upload_file_name(target, &ident::generate_default());
        info!(file_name = %file_name, size = target.bytes.len(), "requesting signed upload url");

        let request = HttpRequest::get(self.signed_url_endpoint(&file_name)?);
        let response = send_cancellable(self.transport.as_ref(), request, cancel).await?;
        if !response.is_success() {
            return Err(PipelineError::Upload(format!(
                "Failed to get signed URL: {}",
                response.status_text()
            )));
        }
        let signed_url = response.text().trim().to_string();
        debug!(file_name = %file_name, "signed url issued");

        let request = HttpRequest::put(signed_url, target.bytes.clone())
            .header("Content-Type", target.content_type.clone());
        let response = send_cancellable(self.transport.as_ref(), request, cancel).await?;
        if !response.is_success() {
            return Err(PipelineError::Upload(format!(
                "Failed to upload file: {}",
                response.status_text()
            )));
        }

        let asset = RemoteAsset {
            url: self.asset_url(&file_name),
        };
        info!(url = %asset.url, "upload finished");
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedReply, ScriptedTransport};
    use crate::transport::HttpMethod;

    fn uploader(transport: Arc<ScriptedTransport>) -> MediaUploader {
        MediaUploader::new(transport, Arc::new(EffectsConfig::default()))
    }

    #[test]
    fn extension_follows_file_name() {
        let png = UploadTarget::new("photo.png", "image/png", Vec::new());
        assert_eq!(png.extension(), "png");
        let bare = UploadTarget::new("photo", "image/jpeg", Vec::new());
        assert_eq!(bare.extension(), "jpg");
        let trailing = UploadTarget::new("photo.", "image/jpeg", Vec::new());
        assert_eq!(trailing.extension(), "jpg");
        let double = UploadTarget::new("archive.tar.webp", "image/webp", Vec::new());
        assert_eq!(double.extension(), "webp");
    }

    #[test]
    fn file_name_lives_under_media() {
        let target = UploadTarget::new("a.jpg", "image/jpeg", Vec::new());
        assert_eq!(upload_file_name(&target, "abc"), "media/abc.jpg");
    }

    #[test]
    fn signed_url_endpoint_encodes_query() {
        let uploader = uploader(Arc::new(ScriptedTransport::new()));
        let url = uploader.signed_url_endpoint("media/abc.png").unwrap();
        assert_eq!(
            url,
            "https://core.faceswapper.ai/media/get-upload-url?fileName=media%2Fabc.png&projectId=dressr"
        );
    }

    #[test]
    fn content_type_guess_is_case_insensitive() {
        assert_eq!(content_type_for("A.JPG"), "image/jpeg");
        assert_eq!(content_type_for("clip.webm"), "video/webm");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn upload_puts_bytes_and_returns_asset_url() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(
                    HttpMethod::Get,
                    "/get-upload-url",
                    vec![ScriptedReply::text("https://storage.example/put?sig=1\n")],
                )
                .on(
                    HttpMethod::Put,
                    "storage.example",
                    vec![ScriptedReply::status(200, "OK")],
                ),
        );
        let target = UploadTarget::new("photo.png", "image/png", vec![1, 2, 3]);
        let asset = uploader(transport.clone())
            .upload(&target, &CancellationToken::new())
            .await
            .unwrap();

        assert!(asset.url.starts_with("https://assets.dressr.ai/media/"));
        assert!(asset.url.ends_with(".png"));
        let id = asset
            .url
            .trim_start_matches("https://assets.dressr.ai/media/")
            .trim_end_matches(".png");
        assert_eq!(id.len(), 21);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        let put = &requests[1];
        assert_eq!(put.url, "https://storage.example/put?sig=1");
        assert_eq!(put.header_value("Content-Type"), Some("image/png"));
        assert_eq!(put.body.as_deref(), Some([1u8, 2, 3].as_slice()));
    }

    #[tokio::test]
    async fn signed_url_failure_reports_status_text() {
        let transport = Arc::new(ScriptedTransport::new().on(
            HttpMethod::Get,
            "/get-upload-url",
            vec![ScriptedReply::status(403, "Forbidden")],
        ));
        let target = UploadTarget::new("a.jpg", "image/jpeg", vec![0]);
        let err = uploader(transport.clone())
            .upload(&target, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to get signed URL: Forbidden");
        assert_eq!(transport.count(HttpMethod::Put, ""), 0);
    }

    #[tokio::test]
    async fn put_failure_reports_status_text() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(
                    HttpMethod::Get,
                    "/get-upload-url",
                    vec![ScriptedReply::text("https://storage.example/put")],
                )
                .on(
                    HttpMethod::Put,
                    "storage.example",
                    vec![ScriptedReply::status(500, "Internal Server Error")],
                ),
        );
        let target = UploadTarget::new("a.jpg", "image/jpeg", vec![0]);
        let err = uploader(transport)
            .upload(&target, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to upload file: Internal Server Error"
        );
    }

    #[tokio::test]
    async fn cancelled_token_issues_no_requests() {
        let transport = Arc::new(ScriptedTransport::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let target = UploadTarget::new("a.jpg", "image/jpeg", vec![0]);
        let err = uploader(transport.clone())
            .upload(&target, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn from_path_reads_file_and_guesses_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selfie.PNG");
        std::fs::write(&path, [9u8, 9, 9]).unwrap();
        let target = UploadTarget::from_path(&path).await.unwrap();
        assert_eq!(target.name, "selfie.PNG");
        assert_eq!(target.content_type, "image/png");
        assert_eq!(target.bytes, vec![9, 9, 9]);
        assert_eq!(target.extension(), "PNG");
    }
}
