use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use veil_core::PipelineOptions;
use veil_ocr::TesseractConfig;
use veil_rules::{Classifier, ClassifierConfig, RulesError};

const DEFAULT_OUTPUT_DIR: &str = "processed";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Directory for masked copies (default: ./processed)
    pub output_dir: Option<String>,

    pub tesseract: TesseractConfig,

    /// Replaces the built-in rule set when present
    pub classifier: Option<ClassifierConfig>,

    /// JPEG re-encode quality (1-100)
    pub jpeg_quality: u8,

    pub verify: bool,

    /// Worker threads for `mask`
    pub jobs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let options = PipelineOptions::default();
        Self {
            output_dir: None,
            tesseract: TesseractConfig::default(),
            classifier: None,
            jpeg_quality: options.jpeg_quality,
            verify: options.verify,
            jobs: 1,
        }
    }
}

impl AppConfig {
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(self.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR))
    }

    pub fn build_classifier(&self) -> Result<Classifier, RulesError> {
        match &self.classifier {
            Some(config) => Classifier::new(config.clone()),
            None => Ok(Classifier::default()),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
            verify: self.verify,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config dir unavailable")]
    NoConfigDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let dirs = directories::ProjectDirs::from("", "", "veil").ok_or(ConfigError::NoConfigDir)?;
    Ok(dirs.config_dir().join("config.json"))
}

/// Resolve `--config` or the default location.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

/// Missing file means defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        log::debug!("[Config] {} not found, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}
