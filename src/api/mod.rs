//! Backend API module.
//!
//! Declares the three backend service groups as traits and implements them over HTTP.
//! Stores depend on the traits only, so they can run against any backend.

mod auth;
mod chat;
mod drive;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;

use crate::auth::CredentialReader;
use crate::config::Config;
use crate::errors::{decode_error_body, ClientError, ErrorResponse};
use crate::models::{
    AuthResponse, ChatHistory, ChatReply, ConnectResponse, ConnectionStatus, DriveEntry,
    FileUpload, Listing, User,
};

/// Authentication service.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Resolve the current credential to a profile.
    async fn profile(&self) -> Result<User, ClientError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError>;
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthResponse, ClientError>;
    /// Invalidate a credential on the backend.
    async fn sign_out(&self, credential: &str) -> Result<(), ClientError>;
    async fn delete_account(&self) -> Result<(), ClientError>;
}

/// Storage-link service.
#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn connection_status(&self) -> Result<ConnectionStatus, ClientError>;
    /// Start linking a storage account; returns where the user authorizes it.
    async fn begin_link(&self) -> Result<ConnectResponse, ClientError>;
    async fn list_entries(
        &self,
        folder_id: Option<&str>,
        search: Option<&str>,
    ) -> Result<Listing, ClientError>;
    async fn upload_entry(
        &self,
        file: &FileUpload,
        parent_id: Option<&str>,
    ) -> Result<DriveEntry, ClientError>;
    async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveEntry, ClientError>;
}

/// Assistant service.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn history(&self) -> Result<ChatHistory, ClientError>;
    /// Build the retrieval index over the linked documents.
    async fn initialize_index(&self) -> Result<(), ClientError>;
    async fn send_message(&self, text: &str) -> Result<ChatReply, ClientError>;
}

/// Success response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<T>,
}

fn default_success() -> bool {
    true
}

/// HTTP implementation of all three backend service groups.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    credentials: CredentialReader,
}

impl HttpApi {
    /// Create a client for the configured backend.
    pub fn new(config: &Config, credentials: CredentialReader) -> Result<Self, ClientError> {
        Self::with_timeout(&config.api_base_url, config.request_timeout, credentials)
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        credentials: CredentialReader,
    ) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Build a request, attaching the persisted credential when there is one.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.credentials.credential() {
            Some(credential) => builder.bearer_auth(credential),
            None => builder,
        }
    }

    /// Send a request and unwrap the `data` member of the success envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = checked(request.send().await?).await?;
        let status = response.status();
        let body = response.text().await?;
        let envelope: ApiResponse<T> = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(reported_failure(status, &body));
        }
        envelope
            .data
            .ok_or_else(|| ClientError::Decode("Response envelope has no data".to_string()))
    }

    /// Send a request whose success body carries nothing of interest beyond the
    /// envelope's `success` flag. Empty or non-envelope bodies count as success.
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        let response = checked(request.send().await?).await?;
        let status = response.status();
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(());
        }
        match serde_json::from_str::<ApiResponse<IgnoredAny>>(&body) {
            Ok(envelope) if !envelope.success => Err(reported_failure(status, &body)),
            _ => Ok(()),
        }
    }
}

/// Error for a success status whose envelope says `"success": false`.
fn reported_failure(status: reqwest::StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(ErrorResponse::into_message)
        .unwrap_or_else(|| "Backend reported failure".to_string());
    tracing::debug!("Backend reported failure with {}: {}", status, message);
    ClientError::Server {
        status: status.as_u16(),
        message,
    }
}

/// Turn a non-success response into an error, decoding its envelope.
async fn checked(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = decode_error_body(status, &body);
    tracing::debug!("Backend returned {}: {}", status, err);
    Err(err)
}
