//! Session orchestration: route a message, run the matching pipeline, reply.
//!
//! Failures never reach the sender verbatim. Each pipeline logs the cause and
//! answers with its own fixed message.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::Settings;
use crate::error::Error;
use crate::providers::{CompletionGateway, Gateways, MediaGateway, ProviderError};
use crate::whatsapp::Transport;

use super::history::{HistoryStore, Turn};
use super::routing::{classify, normalize_sender, AllowList, InboundMessage, RoutedAction};

pub const TEXT_ERROR_REPLY: &str = "Desculpe, ocorreu um erro ao processar sua solicitação.";
pub const IMAGE_ACK: &str = "🎨 Criando sua imagem... aguarde um momento.";
pub const IMAGE_ERROR_REPLY: &str =
    "Desculpe, não consegui gerar a imagem. Tente novamente com outra descrição.";
pub const AUDIO_ERROR_REPLY: &str = "Desculpe, tive um problema ao ouvir seu áudio.";

pub fn image_caption(prompt: &str) -> String {
    format!("Imagem gerada para: \"{}\"", prompt)
}

pub fn transcription_notice(text: &str) -> String {
    format!("🎤 *Transcrição:* \"{}\"", text)
}

/// Temp audio file. `remove` deletes it asynchronously; if the guard is
/// dropped on an error path instead, `Drop` deletes it synchronously.
struct TempAudio {
    path: PathBuf,
    removed: bool,
}

impl TempAudio {
    async fn write(path: PathBuf, data: &[u8]) -> std::io::Result<Self> {
        tokio::fs::write(&path, data).await?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!("Removed temp audio {}", self.path.display()),
            Err(e) => tracing::warn!("Failed to remove temp audio {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed temp audio {}", self.path.display()),
            Err(e) => tracing::warn!("Failed to remove temp audio {}: {}", self.path.display(), e),
        }
    }
}

/// Wires routing, history, AI gateways and the transport together.
pub struct SessionOrchestrator {
    transport: Arc<dyn Transport>,
    completion: Arc<dyn CompletionGateway>,
    media: Arc<dyn MediaGateway>,
    history: Mutex<HistoryStore>,
    allowed_numbers: Vec<String>,
    temp_dir: PathBuf,
}

impl SessionOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        completion: Arc<dyn CompletionGateway>,
        media: Arc<dyn MediaGateway>,
        history: HistoryStore,
        allowed_numbers: Vec<String>,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            transport,
            completion,
            media,
            history: Mutex::new(history),
            allowed_numbers,
            temp_dir,
        }
    }

    pub fn from_settings(transport: Arc<dyn Transport>, gateways: Gateways, settings: &Settings) -> Self {
        Self::new(
            transport,
            gateways.completion,
            gateways.media,
            HistoryStore::new(
                settings.history.max_history,
                settings.history.max_conversations,
            ),
            settings.access.allowed_numbers.clone(),
            settings.bridge.temp_dir(),
        )
    }

    /// Handle one inbound message end to end. Returns the routed action.
    pub async fn handle(&self, msg: InboundMessage) -> RoutedAction {
        let allow_list = AllowList::from_entries(&self.allowed_numbers);
        let action = classify(&msg, allow_list.as_ref());

        match &action {
            RoutedAction::Ignore => {}
            RoutedAction::TextRequest { prompt } => {
                tracing::info!("Text request from {}", msg.from);
                self.handle_text(&msg, prompt).await;
            }
            RoutedAction::ImageRequest { prompt } => {
                tracing::info!("Image request from {}", msg.from);
                self.handle_image(&msg, prompt).await;
            }
            RoutedAction::AudioRequest => {
                tracing::info!("Voice message received from {}, downloading...", msg.from);
                if let Err(e) = self.handle_audio(&msg).await {
                    tracing::error!("Error processing audio: {}", e);
                    self.reply(&msg, AUDIO_ERROR_REPLY).await;
                }
            }
        }

        action
    }

    /// Snapshot of a conversation's history.
    pub fn history(&self, conversation_id: &str) -> Vec<Turn> {
        self.lock_history().get(conversation_id)
    }

    /// Forget every conversation.
    pub fn clear_history(&self) {
        self.lock_history().clear();
    }

    async fn handle_text(&self, msg: &InboundMessage, prompt: &str) {
        match self.converse(&msg.from, prompt).await {
            Ok(response) => self.reply(msg, &response).await,
            Err(e) => {
                tracing::error!("Error generating response: {}", e);
                self.reply(msg, TEXT_ERROR_REPLY).await;
            }
        }
    }

    async fn handle_image(&self, msg: &InboundMessage, prompt: &str) {
        // The notice goes out first and its outcome doesn't gate generation.
        self.reply(msg, IMAGE_ACK).await;

        if let Err(e) = self.send_generated_image(&msg.from, prompt).await {
            tracing::error!("Error generating image: {}", e);
            self.reply(msg, IMAGE_ERROR_REPLY).await;
        }
    }

    async fn send_generated_image(&self, to: &str, prompt: &str) -> Result<(), Error> {
        let url = self.media.generate_image(prompt).await?;
        let media = self.media.fetch_media(&url).await?;
        let caption = image_caption(prompt);
        self.transport.send_media(to, media, Some(&caption)).await?;
        Ok(())
    }

    async fn handle_audio(&self, msg: &InboundMessage) -> Result<(), Error> {
        let media = self.transport.download_media(&msg.id).await?;

        let file_name = format!(
            "temp_audio_{}_{}.{}",
            normalize_sender(&msg.from),
            ulid::Ulid::new(),
            media.extension()
        );
        let temp = TempAudio::write(self.temp_dir.join(file_name), &media.data).await?;

        tracing::info!("Transcribing audio...");
        let transcription = self.media.transcribe(temp.path()).await?;
        temp.remove().await;
        tracing::info!("Transcription: {}", transcription);

        self.reply(msg, &transcription_notice(&transcription)).await;

        let response = self.converse(&msg.from, &transcription).await?;
        self.reply(msg, &response).await;
        Ok(())
    }

    /// Record the user turn, ask the model, record its answer.
    ///
    /// The user turn stays recorded even when the completion fails.
    async fn converse(&self, conversation_id: &str, content: &str) -> Result<String, ProviderError> {
        let history = self
            .lock_history()
            .append(conversation_id, Turn::user(content));

        let response = self.completion.complete(&history).await?;

        self.lock_history()
            .append(conversation_id, Turn::assistant(response.clone()));

        Ok(response)
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) {
        if let Err(e) = self.transport.send_text(&msg.from, text, Some(&msg.id)).await {
            tracing::warn!("Failed to send reply to {}: {}", msg.from, e);
        }
    }

    fn lock_history(&self) -> MutexGuard<'_, HistoryStore> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}
