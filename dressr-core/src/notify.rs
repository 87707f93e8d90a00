use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};

/// User-facing side effects the pipeline cannot perform on its own.
pub trait Notifier: Send + Sync {
    /// Blocking, modal-style message.
    fn alert(&self, message: &str);
    /// Hands `url` to something that can display it outside the pipeline.
    fn open_external(&self, url: &str);
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SavedFile {
    pub file_name: String,
    pub location: String,
    pub bytes: usize,
}

#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> PipelineResult<SavedFile>;
}

/// Writes downloads into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> PipelineResult<SavedFile> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PipelineError::Io {
                source,
                path: self.dir.clone(),
            })?;
        let path = self.dir.join(file_name);
        fs::write(&path, bytes)
            .await
            .map_err(|source| PipelineError::Io {
                source,
                path: path.clone(),
            })?;
        info!(path = %path.display(), bytes = bytes.len(), "download saved");
        Ok(SavedFile {
            file_name: file_name.to_string(),
            location: path.display().to_string(),
            bytes: bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn directory_sink_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("nested/out"));
        let saved = sink.save("evidence_abc.png", b"png-bytes").await.unwrap();
        assert_eq!(saved.bytes, 9);
        let written = std::fs::read(dir.path().join("nested/out/evidence_abc.png")).unwrap();
        assert_eq!(written, b"png-bytes");
    }
}
