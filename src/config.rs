//! Configuration loading for zapgpt.
//!
//! Settings come from an optional `~/.zapgpt/settings.json`, then the
//! environment wins over whatever the file says.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Default number of turns kept per conversation.
pub const MAX_HISTORY_LENGTH: usize = 10;

/// Default number of conversations tracked at once.
pub const MAX_CONVERSATIONS: usize = 1000;

/// Default greeting used when no system prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Você é um assistente útil e amigável.";

/// Get the zapgpt home directory (~/.zapgpt).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".zapgpt"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from the settings file (if any) and the process environment.
pub fn load_settings() -> Result<Settings> {
    let path = get_settings_path()?;

    let mut settings = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        tracing::debug!("Loaded settings from {}", path.display());
        settings
    } else {
        Settings::default()
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    validate_settings(&settings)?;

    Ok(settings)
}

/// Overlay environment variables onto `settings`.
///
/// `lookup` abstracts `std::env::var` so the mapping can be exercised without
/// touching the real process environment.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        match port.trim().parse::<u16>() {
            Ok(p) => settings.server.port = p,
            Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
        }
    }

    if let Some(list) = lookup("ALLOWED_NUMBERS") {
        settings.access.allowed_numbers = list
            .split(',')
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
    }

    // `systema_prompty` predates SYSTEM_PROMPT and still takes precedence.
    if let Some(prompt) = lookup("systema_prompty")
        .filter(|p| !p.is_empty())
        .or_else(|| lookup("SYSTEM_PROMPT").filter(|p| !p.is_empty()))
    {
        settings.prompt.system_prompt = Some(prompt);
    }

    if let Some(file) = lookup("SYSTEM_PROMPT_FILE") {
        if !file.is_empty() {
            settings.prompt.system_prompt_file = Some(PathBuf::from(file));
        }
    }

    if let Some(key) = lookup("OPENAI_API_KEY") {
        settings.openai.api_key = Some(key);
    }
    if let Some(url) = lookup("OPENAI_BASE_URL") {
        settings.openai.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(model) = lookup("OPENAI_CHAT_MODEL") {
        settings.openai.chat_model = model;
    }
    if let Some(model) = lookup("OPENAI_IMAGE_MODEL") {
        settings.openai.image_model = model;
    }
    if let Some(model) = lookup("OPENAI_TRANSCRIPTION_MODEL") {
        settings.openai.transcription_model = model;
    }
    if let Some(lang) = lookup("TRANSCRIPTION_LANGUAGE") {
        settings.openai.transcription_language = lang;
    }

    if let Some(cmd) = lookup("WHATSAPP_BRIDGE_CMD") {
        settings.bridge.command = cmd.split_whitespace().map(str::to_string).collect();
    }
    if let Some(dir) = lookup("ZAPGPT_TEMP_DIR") {
        settings.bridge.temp_dir = Some(PathBuf::from(dir));
    }

    if let Some(max) = lookup("MAX_HISTORY_LENGTH") {
        match max.trim().parse::<usize>() {
            Ok(m) => settings.history.max_history = m,
            Err(_) => tracing::warn!("Ignoring invalid MAX_HISTORY_LENGTH value: {}", max),
        }
    }
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.history.max_history == 0 {
        return Err(Error::Config(
            "history.max_history must be at least 1".to_string(),
        ));
    }
    if settings.history.max_conversations == 0 {
        return Err(Error::Config(
            "history.max_conversations must be at least 1".to_string(),
        ));
    }
    if settings.bridge.command.is_empty() {
        return Err(Error::Config("bridge.command must not be empty".to_string()));
    }
    Ok(())
}

/// HTTP server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// OpenAI-compatible API configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_transcription_language")]
    pub transcription_language: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_transcription_language() -> String {
    "pt".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            image_model: default_image_model(),
            image_size: default_image_size(),
            transcription_model: default_transcription_model(),
            transcription_language: default_transcription_language(),
        }
    }
}

/// System prompt sources.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PromptConfig {
    pub system_prompt: Option<String>,
    pub system_prompt_file: Option<PathBuf>,
}

/// Sender filtering.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AccessConfig {
    /// Raw allow-list entries; empty means everyone is allowed.
    #[serde(default)]
    pub allowed_numbers: Vec<String>,
}

/// WhatsApp bridge process configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_command")]
    pub command: Vec<String>,
    pub temp_dir: Option<PathBuf>,
}

fn default_bridge_command() -> Vec<String> {
    vec!["node".to_string(), "whatsapp-bridge.js".to_string()]
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: default_bridge_command(),
            temp_dir: None,
        }
    }
}

impl BridgeConfig {
    /// Directory for transient audio files.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Conversation history bounds.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HistoryConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
}

fn default_max_history() -> usize {
    MAX_HISTORY_LENGTH
}

fn default_max_conversations() -> usize {
    MAX_CONVERSATIONS
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            max_conversations: default_max_conversations(),
        }
    }
}

/// zapgpt settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub prompt: PromptConfig,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

impl Settings {
    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Settings {
        let mut out = self.clone();
        if let Some(key) = &out.openai.api_key {
            let tail: String = key
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            out.openai.api_key = Some(format!("****{}", tail));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.history.max_history, MAX_HISTORY_LENGTH);
        assert_eq!(settings.openai.chat_model, "gpt-3.5-turbo");
        assert_eq!(settings.openai.transcription_language, "pt");
        assert!(settings.access.allowed_numbers.is_empty());
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("PORT", "8080"),
            ("ALLOWED_NUMBERS", "5511999999999, +55 21 98888-7777,,"),
            ("SYSTEM_PROMPT", "Seja breve."),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:9999/v1/"),
            ("WHATSAPP_BRIDGE_CMD", "node bridge/index.js --headless"),
        ]);
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |k| vars.get(k).cloned());

        assert_eq!(settings.server.port, 8080);
        assert_eq!(
            settings.access.allowed_numbers,
            vec!["5511999999999".to_string(), "+55 21 98888-7777".to_string()]
        );
        assert_eq!(settings.prompt.system_prompt.as_deref(), Some("Seja breve."));
        assert_eq!(settings.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.openai.base_url, "http://localhost:9999/v1");
        assert_eq!(
            settings.bridge.command,
            vec!["node", "bridge/index.js", "--headless"]
        );
    }

    #[test]
    fn test_legacy_prompt_variable_wins() {
        let vars = env(&[("systema_prompty", "legacy"), ("SYSTEM_PROMPT", "new")]);
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |k| vars.get(k).cloned());
        assert_eq!(settings.prompt.system_prompt.as_deref(), Some("legacy"));
    }

    #[test]
    fn test_empty_legacy_prompt_falls_through() {
        let vars = env(&[("systema_prompty", ""), ("SYSTEM_PROMPT", "Seja breve.")]);
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |k| vars.get(k).cloned());
        assert_eq!(settings.prompt.system_prompt.as_deref(), Some("Seja breve."));
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let vars = env(&[("PORT", "not-a-port")]);
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |k| vars.get(k).cloned());
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn test_validation_rejects_zero_bounds() {
        let mut settings = Settings::default();
        settings.history.max_history = 0;
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.history.max_conversations = 0;
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.bridge.command.clear();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_partial_settings_file() {
        let settings: Settings =
            serde_json::from_str(r#"{"server": {"port": 4000}, "access": {"allowed_numbers": ["123"]}}"#)
                .unwrap();
        assert_eq!(settings.server.port, 4000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.access.allowed_numbers, vec!["123"]);
        assert_eq!(settings.openai.image_model, "dall-e-3");
    }

    #[test]
    fn test_redacted_masks_key() {
        let mut settings = Settings::default();
        settings.openai.api_key = Some("sk-abcdef1234".to_string());
        assert_eq!(
            settings.redacted().openai.api_key.as_deref(),
            Some("****1234")
        );
    }
}
