use std::sync::Arc;

use crate::template::PromptTemplate;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Pending input text and the submit action.
pub struct Composer {
    template: Arc<PromptTemplate>,
    user_message: String,
    cursor: usize,
}

impl Composer {
    pub fn new(template: Arc<PromptTemplate>) -> Self {
        Self {
            template,
            user_message: String::new(),
            cursor: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.user_message
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.user_message, self.cursor);
        self.user_message.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.user_message, self.cursor);
            self.user_message.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.user_message.chars().count() {
            let byte_pos = char_to_byte_index(&self.user_message, self.cursor);
            self.user_message.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        let char_count = self.user_message.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.user_message.chars().count();
    }

    pub fn clear(&mut self) {
        self.user_message.clear();
        self.cursor = 0;
    }

    /// Wrap the pending text in the template and hand it to `on_send`.
    ///
    /// Inert while `enabled` is false or the text is blank; the buffer is left
    /// untouched in both cases. Otherwise `on_send` runs exactly once and the
    /// buffer is cleared. Returns whether the callback fired.
    pub fn submit<F>(&mut self, enabled: bool, on_send: F) -> bool
    where
        F: FnOnce(String),
    {
        if !enabled || self.user_message.trim().is_empty() {
            return false;
        }

        let final_prompt = self.template.build_prompt(&self.user_message);
        tracing::debug!(prompt = %final_prompt, "User typed message");
        on_send(final_prompt);
        self.clear();
        true
    }
}
