//! Configuration errors.

use std::path::Path;

use thiserror::Error;

/// Errors while loading, parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {message}")]
    ParseToml { path: String, message: String },

    #[error("invalid YAML in {path}: {message}")]
    ParseYaml { path: String, message: String },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no home directory found")]
    NoHomeDir,

    #[error("invalid environment override {variable}: {message}")]
    EnvOverride { variable: String, message: String },

    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn read_file(path: &Path, source: std::io::Error) -> Self {
        Self::ReadFile { path: path.display().to_string(), source }
    }

    pub fn write_file(path: &Path, source: std::io::Error) -> Self {
        Self::WriteFile { path: path.display().to_string(), source }
    }

    pub fn create_dir(path: &Path, source: std::io::Error) -> Self {
        Self::CreateDir { path: path.display().to_string(), source }
    }

    pub fn parse_toml(path: &Path, error: toml::de::Error) -> Self {
        Self::ParseToml { path: path.display().to_string(), message: error.to_string() }
    }

    pub fn parse_yaml(path: &Path, error: serde_yaml::Error) -> Self {
        Self::ParseYaml { path: path.display().to_string(), message: error.to_string() }
    }
}
