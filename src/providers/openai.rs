//! OpenAI HTTP provider: chat completions, image generation, transcription.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{OpenAiConfig, Settings};
use crate::core::Turn;
use crate::whatsapp::MediaPayload;

use super::prompt::SystemPrompt;
use super::provider::{CompletionGateway, MediaGateway, ProviderError, Result};

pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    chat_model: String,
    image_model: String,
    image_size: String,
    transcription_model: String,
    language: String,
    system_prompt: SystemPrompt,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl OpenAiProvider {
    pub fn new(config: &OpenAiConfig, system_prompt: SystemPrompt) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            image_model: config.image_model.clone(),
            image_size: config.image_size.clone(),
            transcription_model: config.transcription_model.clone(),
            language: config.transcription_language.clone(),
            system_prompt,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.openai, SystemPrompt::from_config(&settings.prompt))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn get_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotAvailable("OPENAI_API_KEY not set".to_string()))
    }

    async fn chat(&self, history: &[Turn]) -> Result<String> {
        let api_key = self.get_api_key()?;
        let system = self.system_prompt.resolve().await;

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message {
            role: "system",
            content: &system,
        });
        messages.extend(history.iter().map(|turn| Message {
            role: turn.role.as_str(),
            content: &turn.content,
        }));

        let request = ChatRequest {
            model: &self.chat_model,
            messages,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let chat_response: ChatResponse = check_status(response).await?.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::ApiError("No response choices".to_string()))
    }

    async fn image(&self, prompt: &str) -> Result<String> {
        let api_key = self.get_api_key()?;

        let request = ImageRequest {
            model: &self.image_model,
            prompt,
            n: 1,
            size: &self.image_size,
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let image_response: ImageResponse = check_status(response).await?.json().await?;

        image_response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| ProviderError::ApiError("No image URL in response".to_string()))
    }

    async fn fetch(&self, url: &str) -> Result<MediaPayload> {
        let response = check_status(self.client.get(url).send().await?).await?;

        let mimetype = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();

        let bytes = response.bytes().await?;
        let mut media = MediaPayload::new(mimetype, bytes.to_vec());
        if let Some(name) = file_name_from_url(url) {
            media = media.with_filename(name);
        }
        Ok(media)
    }

    async fn transcription(&self, path: &Path) -> Result<String> {
        let api_key = self.get_api_key()?;
        let bytes = tokio::fs::read(path).await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.ogg".to_string());

        let form = Form::new()
            .text("model", self.transcription_model.clone())
            .text("language", self.language.clone())
            .part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        let transcription: TranscriptionResponse = check_status(response).await?.json().await?;
        Ok(transcription.text)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(ProviderError::ApiError(format!("HTTP {}: {}", status, text)));
    }
    Ok(response)
}

fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    if name.is_empty() || !name.contains('.') {
        return None;
    }
    Some(name.to_string())
}

#[async_trait]
impl CompletionGateway for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, history: &[Turn]) -> Result<String> {
        self.chat(history)
            .await
            .inspect_err(|e| tracing::error!("OpenAI API Error: {}", e))
    }
}

#[async_trait]
impl MediaGateway for OpenAiProvider {
    async fn generate_image(&self, prompt: &str) -> Result<String> {
        self.image(prompt)
            .await
            .inspect_err(|e| tracing::error!("OpenAI Image Generation Error: {}", e))
    }

    async fn fetch_media(&self, url: &str) -> Result<MediaPayload> {
        self.fetch(url)
            .await
            .inspect_err(|e| tracing::error!("Media download error for {}: {}", url, e))
    }

    async fn transcribe(&self, path: &Path) -> Result<String> {
        self.transcription(path)
            .await
            .inspect_err(|e| tracing::error!("OpenAI Transcription Error: {}", e))
    }
}
