use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EffectsConfig {
    pub account: AccountSection,
    pub effect: EffectSection,
    pub endpoints: EndpointsSection,
    pub polling: PollingSection,
    pub download: DownloadSection,
}

impl EffectsConfig {
    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.effect.mode = mode;
        self
    }

    pub fn with_effect(mut self, effect_id: impl Into<String>) -> Self {
        self.effect.effect_id = effect_id.into();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSection {
    pub user_id: String,
    pub project_id: String,
}

impl Default for AccountSection {
    fn default() -> Self {
        Self {
            user_id: "DObRu1vyStbUynoQmTcHBlhs55z2".into(),
            project_id: "dressr".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSection {
    pub effect_id: String,
    pub mode: ProcessingMode,
    pub tool_type: String,
}

impl Default for EffectSection {
    fn default() -> Self {
        Self {
            effect_id: "mugshot".into(),
            mode: ProcessingMode::ImageEffects,
            tool_type: "image-effects".into(),
        }
    }
}

/// Which generation endpoint (and request shape) a job goes through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    #[default]
    ImageEffects,
    VideoEffects,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::ImageEffects => "image-effects",
            ProcessingMode::VideoEffects => "video-effects",
        }
    }

    /// Path segment of the submission and status endpoints.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ProcessingMode::ImageEffects => "image-gen",
            ProcessingMode::VideoEffects => "video-gen",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "image-effects" => Ok(ProcessingMode::ImageEffects),
            "video-effects" => Ok(ProcessingMode::VideoEffects),
            other => Err(format!("unknown processing mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsSection {
    pub api_base: String,
    pub upload_base: String,
    pub assets_base: String,
}

impl Default for EndpointsSection {
    fn default() -> Self {
        Self {
            api_base: "https://api.chromastudio.ai".into(),
            upload_base: "https://core.faceswapper.ai/media".into(),
            assets_base: "https://assets.dressr.ai".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSection {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl PollingSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_attempts: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    pub filename_prefix: String,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            filename_prefix: "evidence".into(),
        }
    }
}

pub fn load_effects_config<P: AsRef<Path>>(path: P) -> Result<EffectsConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
