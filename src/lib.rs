//! Document Assistant Client
//!
//! Client-side state for the document assistant: who is signed in, whether a storage
//! account is linked, what the file browser shows, and the conversation with the
//! assistant. The backend is reached over HTTP through the traits in [`api`].

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod drive;
pub mod errors;
pub mod models;
pub mod routes;
pub mod session;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use api::{AuthApi, ChatApi, DriveApi, HttpApi};
use auth::{CredentialReader, CredentialStore, FileCredentialStore};
use chat::AssistantSession;
use config::Config;
use drive::{AuthorizationHandoff, BrowserHandoff, DriveStore, LogHandoff, PollSettings};
use errors::ClientError;
use routes::{Gate, Route};
use session::{SessionSnapshot, SessionStore};

/// Application state shared by every view.
#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub session: Arc<SessionStore>,
    pub drive: DriveStore,
    pub assistant: Arc<AssistantSession>,
}

/// The three backend service groups an [`App`] talks to.
pub struct Backend {
    pub auth: Arc<dyn AuthApi>,
    pub drive: Arc<dyn DriveApi>,
    pub chat: Arc<dyn ChatApi>,
}

impl App {
    /// Build the application against the configured HTTP backend.
    pub fn from_config(config: Config) -> Result<Self, ClientError> {
        let credentials: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::open(&config.credential_path)?);
        let http = Arc::new(HttpApi::new(
            &config,
            CredentialReader::new(credentials.clone()),
        )?);
        let handoff: Arc<dyn AuthorizationHandoff> = if config.open_browser {
            Arc::new(BrowserHandoff)
        } else {
            Arc::new(LogHandoff)
        };
        let backend = Backend {
            auth: http.clone(),
            drive: http.clone(),
            chat: http,
        };
        Ok(Self::assemble(config, backend, credentials, handoff))
    }

    /// Wire the stores together over any backend.
    pub fn assemble(
        config: Config,
        backend: Backend,
        credentials: Arc<dyn CredentialStore>,
        handoff: Arc<dyn AuthorizationHandoff>,
    ) -> Self {
        let session = Arc::new(SessionStore::new(backend.auth, credentials));
        let drive = DriveStore::new(
            backend.drive,
            handoff,
            session.subscribe(),
            PollSettings::from(&config),
        );
        let assistant = Arc::new(AssistantSession::new(backend.chat));

        Self {
            config: Arc::new(config),
            session,
            drive,
            assistant,
        }
    }

    /// Resolve the session, check the storage link for a restored user, then keep the
    /// stores in step with later sign-ins and sign-outs.
    ///
    /// Returns the handle of the background task that follows the session.
    pub async fn start(&self) -> JoinHandle<()> {
        self.session.initialize().await;

        let mut changes = self.session.subscribe();
        let current = user_id(&changes.borrow_and_update());
        if current.is_some() {
            self.drive.check_status().await;
        }

        tokio::spawn(follow_session(
            changes,
            current,
            self.drive.clone(),
            self.assistant.clone(),
        ))
    }

    /// Decide what the view layer does for a route right now.
    pub fn gate(&self, route: Route) -> Gate {
        routes::resolve(route, &self.session.snapshot(), &self.drive.snapshot())
    }
}

fn user_id(snapshot: &SessionSnapshot) -> Option<String> {
    snapshot.user.as_ref().map(|user| user.id.clone())
}

async fn follow_session(
    mut changes: watch::Receiver<SessionSnapshot>,
    mut current: Option<String>,
    drive: DriveStore,
    assistant: Arc<AssistantSession>,
) {
    while changes.changed().await.is_ok() {
        let next = user_id(&changes.borrow_and_update());
        if next == current {
            continue;
        }

        if current.is_some() {
            drive.reset().await;
            assistant.reset().await;
        }
        if next.is_some() {
            drive.check_status().await;
        }
        current = next;
    }
}

#[cfg(test)]
mod testing;
