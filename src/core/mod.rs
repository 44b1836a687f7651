//! Core module - routing, conversation history and session orchestration.

pub mod history;
pub mod routing;
pub mod session;

pub use history::{HistoryStore, Role, Turn};
pub use routing::{classify, AllowList, InboundMessage, RoutedAction};
pub use session::SessionOrchestrator;
