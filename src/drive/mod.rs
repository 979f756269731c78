//! Connection and file-browser store.
//!
//! Tracks the storage-link state, the current folder position and search filter, and
//! the listing for that position. Listing fetches are numbered; only the most recently
//! issued fetch may commit, so responses arriving out of order never clobber newer data.

mod handoff;
mod poll;

pub use handoff::{AuthorizationHandoff, BrowserHandoff, LogHandoff};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::api::DriveApi;
use crate::config::Config;
use crate::errors::ClientError;
use crate::models::{Breadcrumb, DriveEntry, FileUpload};
use crate::session::SessionSnapshot;

use poll::PollTask;

/// Storage-link lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Not checked yet
    #[default]
    Unknown,
    Disconnected,
    /// Authorization handed off; polling for completion
    Connecting,
    Connected,
}

/// How the most recent link attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Linked,
    TimedOut,
    Cancelled,
}

/// Timing of the link poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

impl From<&Config> for PollSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.poll_interval,
            timeout: config.poll_timeout,
        }
    }
}

/// Everything a file-browser view renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveView {
    pub link: LinkState,
    /// `None` is the root folder.
    pub current_folder_id: Option<String>,
    /// Path from the root to the current folder, root excluded.
    pub breadcrumbs: Vec<Breadcrumb>,
    pub search_query: String,
    pub files: Vec<DriveEntry>,
    /// A listing fetch is in flight.
    pub loading: bool,
    pub last_poll: Option<PollOutcome>,
}

impl DriveView {
    pub fn is_connected(&self) -> bool {
        self.link == LinkState::Connected
    }
}

/// A numbered listing fetch for one folder position.
struct ListingRequest {
    seq: u64,
    folder_id: Option<String>,
    query: String,
}

/// Handle to the store; clones share state.
#[derive(Clone)]
pub struct DriveStore {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn DriveApi>,
    handoff: Arc<dyn AuthorizationHandoff>,
    session: watch::Receiver<SessionSnapshot>,
    poll_settings: PollSettings,
    view: watch::Sender<DriveView>,
    /// Number of the most recently issued listing fetch.
    listing_seq: AtomicU64,
    /// Bumped by `reset`; status results observed across a reset are dropped.
    reset_epoch: AtomicU64,
    poll: Mutex<Option<PollTask>>,
    poll_generation: AtomicU64,
}

impl DriveStore {
    pub fn new(
        api: Arc<dyn DriveApi>,
        handoff: Arc<dyn AuthorizationHandoff>,
        session: watch::Receiver<SessionSnapshot>,
        poll_settings: PollSettings,
    ) -> Self {
        let (view, _) = watch::channel(DriveView::default());
        Self {
            inner: Arc::new(Inner {
                api,
                handoff,
                session,
                poll_settings,
                view,
                listing_seq: AtomicU64::new(0),
                reset_epoch: AtomicU64::new(0),
                poll: Mutex::new(None),
                poll_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn snapshot(&self) -> DriveView {
        self.inner.view.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.view.borrow().is_connected()
    }

    /// Receive every change to the view.
    pub fn subscribe(&self) -> watch::Receiver<DriveView> {
        self.inner.view.subscribe()
    }

    /// Ask the backend whether the storage link is up.
    ///
    /// Does nothing until a user is signed in. Failures count as "not connected". A
    /// result that arrives after the user signed out is dropped.
    pub async fn check_status(&self) -> bool {
        if !self.session_ready() {
            tracing::debug!("No signed-in user; skipping storage-link check");
            return false;
        }
        let epoch = self.inner.reset_epoch.load(Ordering::SeqCst);
        let connected = self.fetch_status().await;
        self.apply_status(connected, epoch).await && connected
    }

    async fn fetch_status(&self) -> bool {
        match self.inner.api.connection_status().await {
            Ok(status) => status.connected,
            Err(e) => {
                tracing::warn!("Storage-link status check failed: {}", e);
                false
            }
        }
    }

    /// Record a status observation, refreshing the listing when the link comes up.
    ///
    /// Returns false when the observation was dropped as stale.
    async fn apply_status(&self, connected: bool, epoch: u64) -> bool {
        let mut stale = false;
        let mut request = None;
        self.inner.view.send_if_modified(|view| {
            if self.inner.reset_epoch.load(Ordering::SeqCst) != epoch || !self.session_ready() {
                stale = true;
                return false;
            }
            let next = match (connected, view.link) {
                (true, _) => LinkState::Connected,
                // An unfinished link attempt is still in progress
                (false, LinkState::Connecting) => LinkState::Connecting,
                (false, _) => LinkState::Disconnected,
            };
            if next == view.link {
                return false;
            }
            view.link = next;
            if next == LinkState::Connected {
                request = self.issue_listing(view);
            }
            true
        });

        if stale {
            tracing::debug!("Dropping storage-link status observed before a sign-out");
            return false;
        }
        if let Some(request) = request {
            tracing::info!("Storage account linked");
            self.complete_listing(request).await;
        }
        true
    }

    /// Navigate to a folder (`None` for the root). Clears any search.
    pub async fn set_folder(&self, folder_id: Option<&str>) {
        let folder_id = folder_id.map(str::to_string);
        let changed = self.inner.view.send_if_modified(|view| {
            let changed = view.current_folder_id != folder_id || !view.search_query.is_empty();
            view.current_folder_id = folder_id;
            view.search_query.clear();
            changed
        });
        if changed {
            self.refresh_listing().await;
        }
    }

    /// Set the search filter. The caller refreshes when it is ready (after debouncing).
    pub fn set_search_query(&self, query: &str) {
        self.inner.view.send_if_modified(|view| {
            if view.search_query == query {
                return false;
            }
            view.search_query = query.to_string();
            true
        });
    }

    /// Set the search filter and refresh in one step.
    pub async fn search(&self, query: &str) {
        self.set_search_query(query);
        self.refresh_listing().await;
    }

    /// Fetch the listing for the current folder and search filter.
    ///
    /// No-op while not linked. A failed fetch empties the file list but keeps the
    /// breadcrumbs; a fetch overtaken by a newer one is discarded.
    pub async fn refresh_listing(&self) {
        let mut request = None;
        self.inner.view.send_if_modified(|view| {
            let was_loading = view.loading;
            request = self.issue_listing(view);
            request.is_some() && !was_loading
        });

        match request {
            Some(request) => self.complete_listing(request).await,
            None => tracing::debug!("Storage not linked; skipping listing refresh"),
        }
    }

    /// Number a new fetch for the view's position and mark it loading.
    ///
    /// Must run inside a view update so numbering and position stay consistent.
    fn issue_listing(&self, view: &mut DriveView) -> Option<ListingRequest> {
        if !view.is_connected() {
            return None;
        }
        let seq = self.inner.listing_seq.fetch_add(1, Ordering::SeqCst) + 1;
        view.loading = true;
        Some(ListingRequest {
            seq,
            folder_id: view.current_folder_id.clone(),
            query: view.search_query.clone(),
        })
    }

    async fn complete_listing(&self, request: ListingRequest) {
        let ListingRequest {
            seq,
            folder_id,
            query,
        } = request;
        let query = query.trim();
        let search = (!query.is_empty()).then_some(query);
        let result = self
            .inner
            .api
            .list_entries(folder_id.as_deref(), search)
            .await;

        let mut stale = false;
        self.inner.view.send_if_modified(|view| {
            if self.inner.listing_seq.load(Ordering::SeqCst) != seq {
                stale = true;
                return false;
            }
            view.loading = false;
            match result {
                Ok(listing) => {
                    view.files = listing.files;
                    view.breadcrumbs = listing.breadcrumbs;
                }
                Err(e) => {
                    tracing::error!("Failed to load files: {}", e);
                    view.files.clear();
                }
            }
            true
        });

        if stale {
            tracing::debug!("Discarding listing #{}; a newer fetch was issued", seq);
        }
    }

    /// Upload into `parent_id`, or the current folder when none is given.
    pub async fn upload_file(
        &self,
        file: &FileUpload,
        parent_id: Option<&str>,
    ) -> Result<DriveEntry, ClientError> {
        let parent = self.target_parent(parent_id);
        let uploaded = self
            .inner
            .api
            .upload_entry(file, parent.as_deref())
            .await?;
        tracing::info!("Uploaded {} ({} bytes)", uploaded.name, file.bytes.len());
        self.refresh_listing().await;
        Ok(uploaded)
    }

    /// Create a folder in `parent_id`, or the current folder when none is given.
    pub async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveEntry, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::Validation(
                "Folder name is required".to_string(),
            ));
        }
        let parent = self.target_parent(parent_id);
        let folder = self
            .inner
            .api
            .create_folder(name, parent.as_deref())
            .await?;
        tracing::info!("Created folder {}", folder.name);
        self.refresh_listing().await;
        Ok(folder)
    }

    /// Drop all per-user state: stop polling and forget the position and listing.
    pub async fn reset(&self) {
        self.stop_polling().await;
        self.inner.view.send_modify(|view| {
            // Invalidate any listing or status check still in flight
            self.inner.listing_seq.fetch_add(1, Ordering::SeqCst);
            self.inner.reset_epoch.fetch_add(1, Ordering::SeqCst);
            *view = DriveView::default();
        });
    }

    fn target_parent(&self, parent_id: Option<&str>) -> Option<String> {
        parent_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.inner.view.borrow().current_folder_id.clone())
    }

    fn session_ready(&self) -> bool {
        self.inner.session.borrow().is_signed_in()
    }
}
