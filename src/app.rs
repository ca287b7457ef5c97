use std::sync::Arc;

use ratatui::layout::Rect;
use tokio::sync::{mpsc, watch};

use crate::composer::Composer;
use crate::ollama::InferenceClient;
use crate::state::UiState;
use crate::template::PromptTemplate;
use crate::view_model::{ChatViewModel, InferenceEvent};

pub struct App {
    pub should_quit: bool,
    pub model_name: String,

    pub composer: Composer,
    pub view_model: ChatViewModel,

    // Observed state, owned by the view-model
    pub ui_state: watch::Receiver<UiState>,
    pub text_input_enabled: watch::Receiver<bool>,

    // Transcript scroll, in lines up from the newest line
    pub scroll: u16,
    pub list_height: u16,
    pub list_area: Option<Rect>,

    pub animation_frame: usize,
}

impl App {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        template: Arc<PromptTemplate>,
        model_name: &str,
        echo_template: bool,
    ) -> (Self, mpsc::UnboundedReceiver<InferenceEvent>) {
        let (view_model, updates) =
            ChatViewModel::new(client, Arc::clone(&template), echo_template);
        let ui_state = view_model.ui_state();
        let text_input_enabled = view_model.text_input_enabled();

        let app = Self {
            should_quit: false,
            model_name: model_name.to_string(),
            composer: Composer::new(template),
            view_model,
            ui_state,
            text_input_enabled,
            scroll: 0,
            list_height: 0,
            list_area: None,
            animation_frame: 0,
        };
        (app, updates)
    }

    pub fn input_enabled(&self) -> bool {
        *self.text_input_enabled.borrow()
    }

    /// Submit the composer through the view-model. Jumps back to the newest
    /// message when something was sent.
    pub fn submit(&mut self) {
        let enabled = self.input_enabled();
        let view_model = &self.view_model;
        if self.composer.submit(enabled, |prompt| view_model.send_message(prompt)) {
            self.scroll = 0;
        }
    }

    pub fn on_inference(&mut self, event: InferenceEvent) {
        self.view_model.apply(event);
    }

    pub fn reset_conversation(&mut self) {
        self.view_model.reset();
        self.composer.clear();
        self.scroll = 0;
    }

    /// Whether some entry is still waiting for its reply.
    pub fn is_loading(&self) -> bool {
        self.ui_state.borrow().messages.iter().any(|m| m.is_loading)
    }

    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = self.animation_frame.wrapping_add(1);
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.list_height.max(2) / 2);
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.list_height.max(2) / 2);
    }
}
