//! Conversion engines.
//!
//! An engine turns a staged file on disk into a [`ConvertedDocument`]. Engines
//! are blocking and may be CPU/GPU heavy; callers run them off the async
//! executor (see `services::conversion`).

use crate::config::ConverterConfig;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub mod docling;
pub mod document;
pub mod native;
mod office;
mod pdf;

pub use docling::DoclingCliConverter;
pub use document::{Block, ConvertedDocument};
pub use native::NativeConverter;

/// Failure while converting one document
#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("unsupported format: {0}")]
    Unsupported(String),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Engine(String),
}

/// Failure to bring an engine up in this process
#[derive(Error, Debug)]
pub enum ConverterInitError {
    #[error("unknown converter engine '{0}'")]
    UnknownEngine(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Trait for document conversion engines
#[async_trait::async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Engine identifier for logs and health output
    fn name(&self) -> &str;

    /// Convert the file at `path`. Blocking.
    fn convert(&self, path: &Path) -> Result<ConvertedDocument, ConverterError>;

    /// Check if the engine is available/healthy
    async fn health_check(&self) -> bool;
}

/// Factory function to create the configured engine. May block while checking
/// external tools.
pub fn create_converter(
    config: &ConverterConfig,
) -> Result<Arc<dyn DocumentConverter>, ConverterInitError> {
    match config.engine.to_lowercase().as_str() {
        "native" | "builtin" => Ok(Arc::new(NativeConverter::new(
            config.max_extracted_size as u64,
        ))),
        "docling" => Ok(Arc::new(DoclingCliConverter::locate(
            &config.docling_command,
        )?)),
        other => Err(ConverterInitError::UnknownEngine(other.to_string())),
    }
}
