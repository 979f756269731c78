//! Out-of-band authorization handoff.
//!
//! Linking a storage account finishes in the user's browser; the store only hands
//! the URL over and then polls for the outcome.

use crate::errors::ClientError;

/// Presents an authorization URL to the user.
pub trait AuthorizationHandoff: Send + Sync {
    fn open(&self, url: &str) -> Result<(), ClientError>;
}

/// Opens the URL in the system's default browser.
pub struct BrowserHandoff;

impl AuthorizationHandoff for BrowserHandoff {
    fn open(&self, url: &str) -> Result<(), ClientError> {
        tracing::info!("Opening storage authorization page in the browser");
        open::that(url)
            .map_err(|e| ClientError::Transport(format!("Could not open browser: {}", e)))
    }
}

/// Only logs the URL; for headless environments.
pub struct LogHandoff;

impl AuthorizationHandoff for LogHandoff {
    fn open(&self, url: &str) -> Result<(), ClientError> {
        tracing::info!("Complete storage authorization at {}", url);
        Ok(())
    }
}
