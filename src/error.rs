//! Error types for zapgpt.

use thiserror::Error;

use crate::providers::ProviderError;
use crate::whatsapp::TransportError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Web error: {0}")]
    Web(String),

    #[error("{0}")]
    Other(String),
}
