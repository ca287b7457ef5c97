//! Chat view-model
//!
//! Owns the transcript and the input gate as observable values. The terminal
//! loop subscribes to both and redraws from whatever they hold; inference runs
//! in a spawned task and reports back through [`InferenceUpdate`]s, which the
//! loop feeds into [`ChatViewModel::apply`] so that all state changes happen
//! on one task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};

use crate::ollama::InferenceClient;
use crate::state::{ChatMessage, UiState};
use crate::template::PromptTemplate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceUpdate {
    Chunk(String),
    Done,
    Failed(String),
}

/// An update tagged with the exchange that produced it, so that replies still
/// in flight when the conversation is reset are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceEvent {
    pub exchange: u64,
    pub update: InferenceUpdate,
}

pub struct ChatViewModel {
    ui_state: watch::Sender<UiState>,
    text_input_enabled: watch::Sender<bool>,
    client: Arc<dyn InferenceClient>,
    template: Arc<PromptTemplate>,
    updates: mpsc::UnboundedSender<InferenceEvent>,
    exchange: AtomicU64,
    echo_template: bool,
}

impl ChatViewModel {
    /// Build a view-model and the receiving end of its inference updates.
    pub fn new(
        client: Arc<dyn InferenceClient>,
        template: Arc<PromptTemplate>,
        echo_template: bool,
    ) -> (Self, mpsc::UnboundedReceiver<InferenceEvent>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let (ui_state, _) = watch::channel(UiState::default());
        let (text_input_enabled, _) = watch::channel(true);

        let view_model = Self {
            ui_state,
            text_input_enabled,
            client,
            template,
            updates,
            exchange: AtomicU64::new(0),
            echo_template,
        };
        (view_model, rx)
    }

    pub fn ui_state(&self) -> watch::Receiver<UiState> {
        self.ui_state.subscribe()
    }

    pub fn text_input_enabled(&self) -> watch::Receiver<bool> {
        self.text_input_enabled.subscribe()
    }

    /// Record the user's turn, open a pending model turn and start inference.
    pub fn send_message(&self, prompt: String) {
        let shown = if self.echo_template {
            prompt.clone()
        } else {
            self.template.user_query(&prompt).to_string()
        };

        self.ui_state.send_modify(|state| {
            state.push(ChatMessage::user(shown));
            state.push(ChatMessage::loading());
        });
        self.text_input_enabled.send_replace(false);

        let exchange = self.exchange.fetch_add(1, Ordering::SeqCst) + 1;
        let client = Arc::clone(&self.client);
        let updates = self.updates.clone();
        tracing::info!(exchange, prompt_len = prompt.len(), "Starting inference");

        tokio::spawn(async move {
            let send = |update| updates.send(InferenceEvent { exchange, update }).is_ok();

            let mut stream = match client.stream(&prompt).await {
                Ok(stream) => stream,
                Err(e) => {
                    send(InferenceUpdate::Failed(e.to_string()));
                    return;
                }
            };

            while let Some(fragment) = stream.next().await {
                let update = match fragment {
                    Ok(text) => InferenceUpdate::Chunk(text),
                    Err(e) => {
                        send(InferenceUpdate::Failed(e.to_string()));
                        return;
                    }
                };
                if !send(update) {
                    return;
                }
            }

            send(InferenceUpdate::Done);
        });
    }

    pub fn apply(&self, event: InferenceEvent) {
        if event.exchange != self.exchange.load(Ordering::SeqCst) {
            tracing::debug!(exchange = event.exchange, "Dropping stale inference update");
            return;
        }

        match event.update {
            InferenceUpdate::Chunk(text) => {
                self.ui_state.send_modify(|state| {
                    let mut message = state
                        .last_model()
                        .map(|m| m.message.clone())
                        .unwrap_or_default();
                    message.push_str(&text);
                    if !state.replace_last_model(ChatMessage::model(message.clone())) {
                        state.push(ChatMessage::model(message));
                    }
                });
            }
            InferenceUpdate::Done => {
                tracing::info!("Inference finished");
                self.ui_state.send_modify(|state| {
                    if state.last_model().is_some_and(|m| m.is_loading) {
                        state.replace_last_model(ChatMessage::model(String::new()));
                    }
                });
                self.text_input_enabled.send_replace(true);
            }
            InferenceUpdate::Failed(error) => {
                tracing::warn!(%error, "Inference failed");
                self.ui_state.send_modify(|state| {
                    let reply = ChatMessage::model(format!("Error: {}", error));
                    if !state.replace_last_model(reply.clone()) {
                        state.push(reply);
                    }
                });
                self.text_input_enabled.send_replace(true);
            }
        }
    }

    /// Start a fresh conversation.
    pub fn reset(&self) {
        self.exchange.fetch_add(1, Ordering::SeqCst);
        self.ui_state.send_replace(UiState::default());
        self.text_input_enabled.send_replace(true);
    }
}
