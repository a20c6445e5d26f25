//! Core types for Hopper
//!
//! This crate provides:
//! - Configuration (`HopperConfig`) with TOML loading and validation
//! - The on-disk stage layout (`backup/`, `processing/`, `complete/`)
//! - Collision-free archive naming
//! - The content transformer contract and its extension registry

pub mod config;
pub mod error;
pub mod store;
pub mod transform;

// Re-exports
pub use config::{HopperConfig, LoggingConfig, PipelineConfig, TransformerKind, WatchConfig};
pub use error::{Error, TransformError};
pub use store::{archive_file_name, write_output_atomic, Layout};
pub use transform::{Passthrough, Transformer, TransformerRegistry, UppercaseText};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
