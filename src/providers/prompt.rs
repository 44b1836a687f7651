//! System prompt resolution.

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::config::{PromptConfig, DEFAULT_SYSTEM_PROMPT};

/// Where the system prompt comes from. Resolved on every call so edits to the
/// prompt file apply without a restart.
#[derive(Debug, Clone, Default)]
pub struct SystemPrompt {
    text: Option<String>,
    file: Option<PathBuf>,
}

impl SystemPrompt {
    pub fn new(text: Option<String>, file: Option<PathBuf>) -> Self {
        Self { text, file }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(config.system_prompt.clone(), config.system_prompt_file.clone())
    }

    /// Prompt file contents if readable, else the configured text, else the
    /// default greeting.
    pub async fn resolve(&self) -> String {
        let mut content = self
            .text
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        if let Some(path) = &self.file {
            match tokio::fs::read_to_string(path).await {
                Ok(text) => content = text,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!("System prompt file {} not found", path.display());
                }
                Err(e) => {
                    tracing::error!("Error reading system prompt file {}: {}", path.display(), e);
                }
            }
        }

        content
    }
}
