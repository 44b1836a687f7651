//! AI gateway traits for zapgpt.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::core::Turn;
use crate::whatsapp::MediaPayload;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    pub fn other(s: impl Into<String>) -> Self {
        ProviderError::Other(s.into())
    }
}

/// Text completion over a conversation.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Complete a conversation. The system prompt is prepended by the
    /// implementation and never part of `history`.
    async fn complete(&self, history: &[Turn]) -> Result<String>;
}

/// Image generation, media fetch and speech-to-text.
#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Generate an image, returning its URL.
    async fn generate_image(&self, prompt: &str) -> Result<String>;

    /// Download a URL into a media payload.
    async fn fetch_media(&self, url: &str) -> Result<MediaPayload>;

    /// Transcribe an audio file.
    async fn transcribe(&self, path: &Path) -> Result<String>;
}
