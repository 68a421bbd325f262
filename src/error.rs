//! Crate error types

use thiserror::Error;

/// Errors produced while building IBL resources
#[derive(Error, Debug)]
pub enum IblError {
    #[error("Failed to initialize GPU context: {0}")]
    InitializationFailed(String),
    #[error("Failed to create resource: {0}")]
    ResourceCreation(String),
    #[error("Failed to load shader: {0}")]
    ShaderLoad(String),
    #[error("Failed to load environment source: {0}")]
    SourceLoad(String),
    #[error("Failed to read back texture data: {0}")]
    Readback(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IblResult<T> = Result<T, IblError>;
