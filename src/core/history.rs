//! Per-conversation message history.
//!
//! Every conversation keeps at most `max_history` turns, oldest evicted first.
//! The number of tracked conversations is bounded too: once full, the least
//! recently touched conversation is dropped to make room for a new one.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::config::{MAX_CONVERSATIONS, MAX_HISTORY_LENGTH};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

struct Conversation {
    turns: VecDeque<Turn>,
    last_used: u64,
}

/// In-memory history keyed by conversation identifier.
pub struct HistoryStore {
    conversations: HashMap<String, Conversation>,
    max_history: usize,
    max_conversations: usize,
    clock: u64,
}

impl HistoryStore {
    /// Create a store with the given per-conversation and total bounds.
    pub fn new(max_history: usize, max_conversations: usize) -> Self {
        Self {
            conversations: HashMap::new(),
            max_history: max_history.max(1),
            max_conversations: max_conversations.max(1),
            clock: 0,
        }
    }

    /// Append a turn, creating the conversation if needed.
    ///
    /// Returns a snapshot of the conversation after eviction.
    pub fn append(&mut self, conversation_id: &str, turn: Turn) -> Vec<Turn> {
        self.clock += 1;
        let now = self.clock;

        if !self.conversations.contains_key(conversation_id) {
            self.make_room();
            tracing::debug!("Tracking new conversation {}", conversation_id);
        }

        let max_history = self.max_history;
        let conv = self
            .conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| Conversation {
                turns: VecDeque::with_capacity(max_history + 1),
                last_used: now,
            });

        conv.last_used = now;
        conv.turns.push_back(turn);
        while conv.turns.len() > max_history {
            conv.turns.pop_front();
        }

        conv.turns.iter().cloned().collect()
    }

    /// Current turns of a conversation, oldest first.
    pub fn get(&self, conversation_id: &str) -> Vec<Turn> {
        self.conversations
            .get(conversation_id)
            .map(|c| c.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of turns stored for a conversation.
    pub fn len(&self, conversation_id: &str) -> usize {
        self.conversations
            .get(conversation_id)
            .map_or(0, |c| c.turns.len())
    }

    /// Number of tracked conversations.
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.conversations.contains_key(conversation_id)
    }

    /// Drop all conversations.
    pub fn clear(&mut self) {
        self.conversations.clear();
    }

    fn make_room(&mut self) {
        while self.conversations.len() >= self.max_conversations {
            let oldest = self
                .conversations
                .iter()
                .min_by_key(|(_, c)| c.last_used)
                .map(|(id, _)| id.clone());

            match oldest {
                Some(id) => {
                    self.conversations.remove(&id);
                    tracing::debug!("Evicted least recently used conversation {}", id);
                }
                None => break,
            }
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(MAX_HISTORY_LENGTH, MAX_CONVERSATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_creates_conversation() {
        let mut store = HistoryStore::default();
        assert!(!store.contains("chat1"));

        let turns = store.append("chat1", Turn::user("Olá"));
        assert_eq!(turns, vec![Turn::user("Olá")]);
        assert!(store.contains("chat1"));
        assert_eq!(store.len("chat1"), 1);
    }

    #[test]
    fn test_history_bounded_fifo() {
        let mut store = HistoryStore::new(10, 100);
        for i in 0..25 {
            store.append("chat1", Turn::user(format!("msg {}", i)));
            assert!(store.len("chat1") <= 10);
        }

        let turns = store.get("chat1");
        assert_eq!(turns.len(), 10);
        assert_eq!(turns[0].content, "msg 15");
        assert_eq!(turns[9].content, "msg 24");
    }

    #[test]
    fn test_conversations_are_independent() {
        let mut store = HistoryStore::default();
        store.append("a", Turn::user("one"));
        store.append("b", Turn::user("two"));
        store.append("a", Turn::assistant("three"));

        assert_eq!(store.len("a"), 2);
        assert_eq!(store.len("b"), 1);
        assert_eq!(store.get("a")[1].role, Role::Assistant);
    }

    #[test]
    fn test_least_recently_used_conversation_evicted() {
        let mut store = HistoryStore::new(10, 2);
        store.append("a", Turn::user("1"));
        store.append("b", Turn::user("2"));
        // Touch "a" so "b" becomes the oldest.
        store.append("a", Turn::user("3"));
        store.append("c", Turn::user("4"));

        assert_eq!(store.conversation_count(), 2);
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
    }

    #[test]
    fn test_default_matches_config_bounds() {
        let store = HistoryStore::default();
        let config = crate::config::HistoryConfig::default();
        assert_eq!(store.max_history, config.max_history);
        assert_eq!(store.max_conversations, config.max_conversations);
    }

    #[test]
    fn test_get_unknown_is_empty() {
        let store = HistoryStore::default();
        assert!(store.get("nobody").is_empty());
        assert_eq!(store.len("nobody"), 0);
    }

    #[test]
    fn test_clear() {
        let mut store = HistoryStore::default();
        store.append("a", Turn::user("1"));
        store.clear();
        assert_eq!(store.conversation_count(), 0);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Turn::assistant("oi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"oi"}"#);
    }
}
