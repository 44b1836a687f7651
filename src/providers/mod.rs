//! AI providers module.

use std::sync::Arc;

pub mod openai;
pub mod prompt;
pub mod provider;

pub use prompt::SystemPrompt;
pub use provider::{CompletionGateway, MediaGateway, ProviderError, Result};

use crate::config::Settings;

/// Provider handles used by the session layer.
pub struct Gateways {
    pub completion: Arc<dyn CompletionGateway>,
    pub media: Arc<dyn MediaGateway>,
}

/// Build the gateways from settings. One OpenAI client serves both.
pub fn create_gateways(settings: &Settings) -> Gateways {
    let provider = Arc::new(openai::OpenAiProvider::from_settings(settings));

    if settings.openai.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; every AI request will fail");
    }

    Gateways {
        completion: provider.clone(),
        media: provider,
    }
}

/// Complete a single prompt with no prior history.
pub async fn complete(prompt: &str, settings: &Settings) -> Result<String> {
    let gateways = create_gateways(settings);
    gateways
        .completion
        .complete(&[crate::core::Turn::user(prompt)])
        .await
}
