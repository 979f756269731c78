//! Assistant conversation for the current session.
//!
//! The transcript lives in memory only. The retrieval index is initialized once per
//! session before the first message goes out.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::api::ChatApi;
use crate::errors::ClientError;
use crate::models::{ChatMessage, Role};

/// Shown in place of a reply when the assistant call fails.
pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

pub struct AssistantSession {
    api: Arc<dyn ChatApi>,
    /// Guards index initialization so concurrent sends initialize once.
    initialized: Mutex<bool>,
    transcript: watch::Sender<Vec<ChatMessage>>,
}

impl AssistantSession {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        let (transcript, _) = watch::channel(Vec::new());
        Self {
            api,
            initialized: Mutex::new(false),
            transcript,
        }
    }

    /// Replace the transcript with the backend's history. Failures are logged only.
    pub async fn load_history(&self) {
        match self.api.history().await {
            Ok(history) => {
                tracing::debug!("Loaded {} chat messages", history.messages.len());
                self.transcript.send_replace(history.messages);
            }
            Err(e) => tracing::warn!("Failed to load chat history: {}", e),
        }
    }

    /// Build the retrieval index, unless this session already did.
    pub async fn initialize_index(&self) -> Result<(), ClientError> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(());
        }
        self.api.initialize_index().await?;
        *initialized = true;
        tracing::info!("Assistant index initialized");
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        *self.initialized.lock().await
    }

    /// Send a message and return the assistant's reply.
    ///
    /// Both the message and the reply are appended to the transcript. When the
    /// assistant fails, an apology is appended in place of the reply and the error is
    /// returned.
    pub async fn send_message(&self, text: &str) -> Result<ChatMessage, ClientError> {
        if text.trim().is_empty() {
            return Err(ClientError::Validation("Message is empty".to_string()));
        }
        self.initialize_index().await?;

        self.append(ChatMessage::new(Role::User, text));
        match self.api.send_message(text).await {
            Ok(reply) => {
                let reply = ChatMessage::new(Role::Assistant, reply.response);
                self.append(reply.clone());
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!("Assistant request failed: {}", e);
                self.append(ChatMessage::new(Role::Assistant, FALLBACK_REPLY));
                Err(e)
            }
        }
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.transcript.subscribe()
    }

    /// Forget the transcript and the index state; used on sign-out.
    pub async fn reset(&self) {
        *self.initialized.lock().await = false;
        self.transcript.send_replace(Vec::new());
    }

    fn append(&self, message: ChatMessage) {
        self.transcript.send_modify(|messages| messages.push(message));
    }
}
