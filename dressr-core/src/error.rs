use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Failures of one pipeline run. The display string is what the user sees.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Upload(String),
    #[error("{0}")]
    Submit(String),
    #[error("{0}")]
    Poll(String),
    #[error("{0}")]
    Job(String),
    #[error("Job timed out")]
    Timeout,
    #[error("No image URL in response")]
    MissingResult,
    #[error("network error: {0}")]
    Transport(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("io error at {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(error: reqwest::Error) -> Self {
        PipelineError::Transport(error.to_string())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
