//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Archive not found: {path}")]
    ArchiveNotFound { path: String },

    #[error("Invalid document in {path}: {message}")]
    InvalidDocument { path: String, message: String },

    #[error("No {kind} document with apiVersion {api_version}")]
    KindNotFound { api_version: String, kind: String },

    #[error("Invalid preflight: {message}")]
    InvalidPreflight { message: String },

    #[error("Unknown version status: {value}")]
    UnknownStatus { value: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<walkdir::Error> for CoreError {
    fn from(e: walkdir::Error) -> Self {
        CoreError::Io(e.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
