//! Inbound message classification.
//!
//! Rules, first match wins:
//! - sender not on the allow-list (when one is configured) -> ignore
//! - `!bot <text>` -> text completion
//! - `!img <text>` -> image generation
//! - voice note or audio attachment -> transcription
//! - anything else -> ignore

use std::collections::HashSet;

/// Prefix for text completion requests.
pub const BOT_PREFIX: &str = "!bot ";

/// Prefix for image generation requests.
pub const IMG_PREFIX: &str = "!img ";

/// Transport message types treated as audio.
const AUDIO_TYPES: [&str; 2] = ["ptt", "audio"];

/// A message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Transport message ID (used to download media and quote replies).
    pub id: String,
    /// Sender / chat identifier.
    pub from: String,
    pub body: String,
    pub has_media: bool,
    /// Transport message type, e.g. `chat`, `ptt`, `audio`, `image`.
    pub media_type: String,
}

impl InboundMessage {
    /// Plain text message without media.
    pub fn text(id: &str, from: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            from: from.to_string(),
            body: body.to_string(),
            has_media: false,
            media_type: "chat".to_string(),
        }
    }

    /// Message carrying media of the given type.
    pub fn media(id: &str, from: &str, body: &str, media_type: &str) -> Self {
        Self {
            id: id.to_string(),
            from: from.to_string(),
            body: body.to_string(),
            has_media: true,
            media_type: media_type.to_string(),
        }
    }
}

/// What to do with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedAction {
    Ignore,
    TextRequest { prompt: String },
    ImageRequest { prompt: String },
    AudioRequest,
}

/// Keep only ASCII digits.
pub fn normalize_sender(id: &str) -> String {
    id.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Set of permitted senders, compared by digits only.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    numbers: HashSet<String>,
}

impl AllowList {
    /// Build from raw entries; `None` only when no entry is configured.
    ///
    /// Entries without digits never match anyone, so a list made only of them
    /// blocks every sender.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Option<Self> {
        if entries.iter().all(|e| e.as_ref().trim().is_empty()) {
            return None;
        }

        let numbers = entries
            .iter()
            .map(|e| normalize_sender(e.as_ref()))
            .filter(|n| !n.is_empty())
            .collect();

        Some(Self { numbers })
    }

    pub fn permits(&self, sender: &str) -> bool {
        self.numbers.contains(&normalize_sender(sender))
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

/// Classify an inbound message.
pub fn classify(msg: &InboundMessage, allow_list: Option<&AllowList>) -> RoutedAction {
    if let Some(list) = allow_list {
        if !list.permits(&msg.from) {
            tracing::debug!("Blocked message from {}", msg.from);
            return RoutedAction::Ignore;
        }
    }

    if let Some(prompt) = msg.body.strip_prefix(BOT_PREFIX) {
        return RoutedAction::TextRequest {
            prompt: prompt.to_string(),
        };
    }

    if let Some(prompt) = msg.body.strip_prefix(IMG_PREFIX) {
        return RoutedAction::ImageRequest {
            prompt: prompt.to_string(),
        };
    }

    if msg.has_media && AUDIO_TYPES.contains(&msg.media_type.as_str()) {
        return RoutedAction::AudioRequest;
    }

    RoutedAction::Ignore
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_prefix() {
        let msg = InboundMessage::text("1", "5511999999999@c.us", "!bot Olá");
        assert_eq!(
            classify(&msg, None),
            RoutedAction::TextRequest {
                prompt: "Olá".to_string()
            }
        );
    }

    #[test]
    fn test_img_prefix() {
        let msg = InboundMessage::text("1", "5511999999999@c.us", "!img gato astronauta");
        assert_eq!(
            classify(&msg, None),
            RoutedAction::ImageRequest {
                prompt: "gato astronauta".to_string()
            }
        );
    }

    #[test]
    fn test_prefix_needs_trailing_space() {
        let msg = InboundMessage::text("1", "x", "!bot");
        assert_eq!(classify(&msg, None), RoutedAction::Ignore);

        let msg = InboundMessage::text("1", "x", "!botOlá");
        assert_eq!(classify(&msg, None), RoutedAction::Ignore);

        let msg = InboundMessage::text("1", "x", "  !bot Olá");
        assert_eq!(classify(&msg, None), RoutedAction::Ignore);
    }

    #[test]
    fn test_empty_prompt_after_prefix() {
        let msg = InboundMessage::text("1", "x", "!bot ");
        assert_eq!(
            classify(&msg, None),
            RoutedAction::TextRequest {
                prompt: String::new()
            }
        );
    }

    #[test]
    fn test_plain_message_ignored() {
        let msg = InboundMessage::text("1", "x", "bom dia");
        assert_eq!(classify(&msg, None), RoutedAction::Ignore);
    }

    #[test]
    fn test_voice_and_audio() {
        let ptt = InboundMessage::media("1", "x", "", "ptt");
        assert_eq!(classify(&ptt, None), RoutedAction::AudioRequest);

        let audio = InboundMessage::media("1", "x", "", "audio");
        assert_eq!(classify(&audio, None), RoutedAction::AudioRequest);

        let image = InboundMessage::media("1", "x", "", "image");
        assert_eq!(classify(&image, None), RoutedAction::Ignore);

        // Type alone is not enough without the media flag.
        let mut no_media = InboundMessage::media("1", "x", "", "ptt");
        no_media.has_media = false;
        assert_eq!(classify(&no_media, None), RoutedAction::Ignore);
    }

    #[test]
    fn test_prefix_beats_audio() {
        let msg = InboundMessage::media("1", "x", "!bot transcreva", "audio");
        assert_eq!(
            classify(&msg, None),
            RoutedAction::TextRequest {
                prompt: "transcreva".to_string()
            }
        );
    }

    #[test]
    fn test_allow_list_digit_normalization() {
        let list = AllowList::from_entries(&["5511999999999"]).unwrap();

        let allowed = InboundMessage::text("1", "+55 11 99999-9999", "!bot Olá");
        assert!(matches!(
            classify(&allowed, Some(&list)),
            RoutedAction::TextRequest { .. }
        ));

        let blocked = InboundMessage::text("2", "5511000000000", "!bot Olá");
        assert_eq!(classify(&blocked, Some(&list)), RoutedAction::Ignore);
    }

    #[test]
    fn test_allow_list_blocks_before_prefix() {
        let list = AllowList::from_entries(&["123"]).unwrap();
        let audio = InboundMessage::media("1", "456@c.us", "", "ptt");
        assert_eq!(classify(&audio, Some(&list)), RoutedAction::Ignore);
    }

    #[test]
    fn test_allow_list_from_entries() {
        assert!(AllowList::from_entries::<&str>(&[]).is_none());
        assert!(AllowList::from_entries(&[" ", ""]).is_none());

        let list = AllowList::from_entries(&["+55 (11) 9999", "5511 9999", "1"]).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.permits("55 1199-99"));
        assert!(list.permits("1@c.us"));
    }

    #[test]
    fn test_allow_list_without_digits_blocks_everyone() {
        let mut settings = crate::config::Settings::default();
        crate::config::apply_env_overrides(&mut settings, |k| {
            (k == "ALLOWED_NUMBERS").then(|| "admin".to_string())
        });

        let list = AllowList::from_entries(&settings.access.allowed_numbers).unwrap();
        assert!(list.is_empty());

        let msg = InboundMessage::text("1", "5511000000000@c.us", "!bot oi");
        assert_eq!(classify(&msg, Some(&list)), RoutedAction::Ignore);

        let digitless = InboundMessage::text("2", "status@broadcast", "!bot oi");
        assert_eq!(classify(&digitless, Some(&list)), RoutedAction::Ignore);
    }

    #[test]
    fn test_normalize_sender() {
        assert_eq!(normalize_sender("5511999999999@c.us"), "5511999999999");
        assert_eq!(normalize_sender("+55 11 99999-9999"), "5511999999999");
        assert_eq!(normalize_sender("abc"), "");
    }
}
