//! Error handling and custom error types
//!
//! Provides unified error handling across the gateway using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CDN error: {0}")]
    Cdn(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No file provided")]
    NoFile,

    #[error("Invalid upload: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Local file {0} has already been migrated to the CDN")]
    AlreadyMigrated(i64),

    #[error("Unrecognized asset reference: {0}")]
    UnrecognizedAsset(String),

    #[error("Upload failed on both backends (remote: {remote}; local: {local})")]
    UploadFailed { remote: String, local: String },

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
