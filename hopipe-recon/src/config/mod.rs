//! Phase configuration: YAML templates, ordered overrides, and the typed,
//! immutable snapshots each reconstruction phase consumes.

mod document;
pub mod overrides;
mod stager;

pub use document::{ConfigDocument, Override};
pub use stager::{
    ConfigStager, GlobalRefinementInputs, RECONSTRUCTION_CONFIG_FILE, ReconstructionConfig,
    TRACKING_CONFIG_FILE, TrackingConfig,
};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, overriding or writing phase configs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("config template {path} is not a mapping")]
    NotAMapping { path: PathBuf },

    #[error("override key '{key}' is not present in template {path}")]
    MissingKey { key: String, path: PathBuf },

    #[error("config key '{key}' in {path} has an invalid value: expected {expected}")]
    InvalidValue {
        key: String,
        path: PathBuf,
        expected: &'static str,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
}
