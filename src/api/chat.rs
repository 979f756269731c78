//! Assistant endpoints.

use async_trait::async_trait;
use reqwest::Method;

use super::{ChatApi, HttpApi};
use crate::errors::ClientError;
use crate::models::{ChatHistory, ChatReply, SendMessageRequest};

#[async_trait]
impl ChatApi for HttpApi {
    /// GET /api/chat/history
    async fn history(&self) -> Result<ChatHistory, ClientError> {
        self.send(self.request(Method::GET, "/chat/history")).await
    }

    /// POST /api/chat/initialize
    async fn initialize_index(&self) -> Result<(), ClientError> {
        self.send_empty(self.request(Method::POST, "/chat/initialize"))
            .await
    }

    /// POST /api/chat/message
    async fn send_message(&self, text: &str) -> Result<ChatReply, ClientError> {
        let body = SendMessageRequest { message: text };
        self.send(self.request(Method::POST, "/chat/message").json(&body))
            .await
    }
}
