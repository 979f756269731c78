//! Session store: who is signed in.
//!
//! Owns the current user and the startup loading flag, and is the only writer of the
//! persisted credential. State lives in a watch channel so other components can react
//! to sign-in and sign-out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::api::AuthApi;
use crate::auth::CredentialStore;
use crate::errors::ClientError;
use crate::models::{AuthResponse, User};

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    /// True only while the startup credential check is in flight.
    pub loading: bool,
}

impl SessionSnapshot {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Single source of truth for the signed-in user.
pub struct SessionStore {
    auth: Arc<dyn AuthApi>,
    credentials: Arc<dyn CredentialStore>,
    state: watch::Sender<SessionSnapshot>,
    initialized: AtomicBool,
}

impl SessionStore {
    pub fn new(auth: Arc<dyn AuthApi>, credentials: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot {
            user: None,
            loading: true,
        });
        Self {
            auth,
            credentials,
            state,
            initialized: AtomicBool::new(false),
        }
    }

    /// Resolve the persisted credential, once per process.
    ///
    /// A rejected credential is discarded silently; the session simply starts signed out.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::warn!("Session already initialized; ignoring");
            return;
        }

        let user = match self.credentials.load() {
            Some(_) => match self.auth.profile().await {
                Ok(user) => {
                    tracing::info!("Restored session for {}", user.email);
                    Some(user)
                }
                Err(e) => {
                    tracing::info!("Persisted credential rejected ({}); signing out", e);
                    if let Err(e) = self.credentials.clear() {
                        tracing::warn!("Failed to clear rejected credential: {}", e);
                    }
                    None
                }
            },
            None => None,
        };

        self.state.send_modify(|state| {
            state.user = user;
            state.loading = false;
        });
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let response = self.auth.sign_in(email, password).await?;
        self.establish(response)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<User, ClientError> {
        let response = self.auth.sign_up(email, password, display_name).await?;
        self.establish(response)
    }

    /// Forget the credential and the user. Never fails.
    ///
    /// Local state is cleared before the backend is told, so a slow or failing
    /// backend cannot keep the session alive.
    pub async fn sign_out(&self) {
        let credential = self.credentials.load();
        if let Err(e) = self.credentials.clear() {
            tracing::warn!("Failed to clear persisted credential: {}", e);
        }
        self.state.send_modify(|state| state.user = None);
        tracing::info!("Signed out");

        if let Some(credential) = credential {
            if let Err(e) = self.auth.sign_out(&credential).await {
                tracing::warn!("Backend sign-out failed: {}", e);
            }
        }
    }

    /// Delete the account on the backend, then sign out.
    pub async fn delete_account(&self) -> Result<(), ClientError> {
        self.auth.delete_account().await?;
        tracing::info!("Account deleted");
        self.sign_out().await;
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Receive every change to the session.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    fn establish(&self, response: AuthResponse) -> Result<User, ClientError> {
        self.credentials.save(&response.access_token)?;
        let user = response.user;
        tracing::info!("Signed in as {}", user.email);
        self.state.send_modify(|state| state.user = Some(user.clone()));
        Ok(user)
    }
}
