//! Messaging transport seam.
//!
//! The session layer only talks to WhatsApp through [`Transport`]; the bridge
//! process is one implementation, test fakes are another.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Bridge connection closed")]
    Closed,

    #[error("Bridge request failed: {0}")]
    Remote(String),

    #[error("Failed to start bridge: {0}")]
    Spawn(String),

    #[error("Invalid media payload: {0}")]
    Media(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Decoded media attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mimetype: String,
    pub data: Vec<u8>,
    pub filename: Option<String>,
}

impl MediaPayload {
    pub fn new(mimetype: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mimetype: mimetype.into(),
            data,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// File extension from the MIME subtype, `ogg` when it can't be told.
    ///
    /// `audio/ogg; codecs=opus` -> `ogg`, `audio/mpeg` -> `mpeg`.
    pub fn extension(&self) -> String {
        self.mimetype
            .split('/')
            .nth(1)
            .and_then(|sub| sub.split(';').next())
            .map(str::trim)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("ogg")
            .to_string()
    }
}

/// Outbound operations on the messaging platform.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send text to a chat, optionally quoting the message being answered.
    async fn send_text(&self, to: &str, text: &str, reply_to: Option<&str>) -> Result<()>;

    /// Send a media attachment with an optional caption.
    async fn send_media(&self, to: &str, media: MediaPayload, caption: Option<&str>) -> Result<()>;

    /// Fetch the attachment of a received message.
    async fn download_media(&self, message_id: &str) -> Result<MediaPayload>;
}
