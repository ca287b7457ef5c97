//! UI-agnostic chat state types
//!
//! These are the snapshots the view-model publishes and the renderer reads.
//! They carry no terminal types.

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub message: String,
    pub is_from_user: bool,
    pub is_loading: bool,
}

impl ChatMessage {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_from_user: true,
            is_loading: false,
        }
    }

    /// Placeholder for a model reply that has not produced any text yet.
    pub fn loading() -> Self {
        Self {
            message: String::new(),
            is_from_user: false,
            is_loading: true,
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_from_user: false,
            is_loading: false,
        }
    }
}

/// Transcript in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub messages: Vec<ChatMessage>,
}

impl UiState {
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Swap the most recent model entry for `message`. Entries are replaced
    /// whole, never edited in place.
    pub fn replace_last_model(&mut self, message: ChatMessage) -> bool {
        match self.messages.iter_mut().rev().find(|m| !m.is_from_user) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }

    pub fn last_model(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| !m.is_from_user)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}
