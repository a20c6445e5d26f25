//! Error types shared across Hopper crates

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by configuration and layout handling
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration could not be rendered
    #[error("Failed to render config: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    /// Path cannot be used for the requested purpose
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },

    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a content transformer
///
/// A transformer that returns any of these must not leave an output file behind.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Reading the input or writing the output failed
    #[error("transform IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input is not in the encoding the transformer declares
    #[error("input {path} is not valid {expected}")]
    Encoding {
        path: PathBuf,
        expected: &'static str,
    },

    /// Output path was already occupied
    #[error("output {0} already exists")]
    OutputExists(PathBuf),
}
