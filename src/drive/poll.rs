//! Storage-link poll loop.
//!
//! After the authorization URL is handed off, the store polls the link status until it
//! comes up or the ceiling passes. At most one loop runs: starting a new one aborts and
//! awaits the previous task, and every loop carries a generation number so a tick that
//! races with cancellation is never applied.
//!
//! The loop itself only observes. The link is marked up and the listing refresh issued
//! once the loop has ended, after the task has given up its slot, so neither the
//! ceiling nor a cancel can cut that refresh short.

use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{DriveStore, LinkState, PollOutcome};
use crate::errors::ClientError;

/// Owned handle of the running poll task.
pub(super) struct PollTask {
    generation: u64,
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Abort the task and wait until it is gone.
    async fn stop(self) {
        self.handle.abort();
        // Cancellation is the expected outcome here
        let _ = self.handle.await;
    }
}

impl DriveStore {
    /// Start linking a storage account.
    ///
    /// Hands the authorization URL to the user, then polls until the link is up or the
    /// attempt times out. Returns the authorization URL.
    pub async fn begin_connect(&self) -> Result<String, ClientError> {
        if self.is_connected() {
            tracing::info!("Storage account already linked");
            return Err(ClientError::Validation(
                "Storage account is already linked".to_string(),
            ));
        }

        let response = self.inner.api.begin_link().await?;
        let auth_url = response
            .auth_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                ClientError::BadRequest("Backend returned no authorization URL".to_string())
            })?;

        if let Err(e) = self.inner.handoff.open(&auth_url) {
            tracing::warn!("Could not hand off authorization URL: {}", e);
        }

        self.start_polling().await;
        Ok(auth_url)
    }

    /// Abandon the current link attempt, if any. A link that is already up stays up.
    pub async fn cancel_connect(&self) {
        if self.stop_polling().await {
            self.inner.view.send_if_modified(|view| {
                if view.is_connected() {
                    return false;
                }
                if view.link == LinkState::Connecting {
                    view.link = LinkState::Disconnected;
                }
                view.last_poll = Some(PollOutcome::Cancelled);
                true
            });
            tracing::info!("Storage link attempt cancelled");
        }
    }

    /// Wait until the current link attempt ends, including the listing refresh that
    /// follows a successful link, and return the resulting state.
    pub async fn wait_for_link(&self) -> LinkState {
        let mut view = self.inner.view.subscribe();
        if !self.is_polling().await {
            return self.snapshot().link;
        }
        // `last_poll` is cleared when a loop starts and set when it ends, together with
        // `loading` when a refresh follows; a reset drops the state back to `Unknown`.
        let settled = view
            .wait_for(|view| {
                (view.last_poll.is_some() && !view.loading) || view.link == LinkState::Unknown
            })
            .await
            .map(|view| view.link);
        settled.unwrap_or_else(|_| self.snapshot().link)
    }

    pub async fn is_polling(&self) -> bool {
        self.inner.poll.lock().await.is_some()
    }

    /// Abort the running poll task. Returns whether one was running.
    pub(super) async fn stop_polling(&self) -> bool {
        let mut slot = self.inner.poll.lock().await;
        self.inner.poll_generation.fetch_add(1, Ordering::SeqCst);
        match slot.take() {
            Some(task) => {
                task.stop().await;
                true
            }
            None => false,
        }
    }

    async fn start_polling(&self) {
        let mut slot = self.inner.poll.lock().await;
        let generation = self.inner.poll_generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = slot.take() {
            previous.stop().await;
            tracing::debug!("Replaced running storage-link poll");
        }

        self.inner.view.send_modify(|view| {
            view.link = LinkState::Connecting;
            view.last_poll = None;
        });

        let store = self.clone();
        let handle = tokio::spawn(async move { store.run_poll(generation).await });
        *slot = Some(PollTask { generation, handle });
        tracing::info!(
            "Waiting for storage authorization (checking every {:?}, up to {:?})",
            self.inner.poll_settings.interval,
            self.inner.poll_settings.timeout
        );
    }

    async fn run_poll(&self, generation: u64) {
        let timeout = self.inner.poll_settings.timeout;
        let outcome = tokio::time::timeout(timeout, self.poll_until_linked(generation))
            .await
            .unwrap_or(PollOutcome::TimedOut);
        self.finish_poll(generation, outcome).await;
    }

    async fn poll_until_linked(&self, generation: u64) -> PollOutcome {
        let period = self.inner.poll_settings.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !self.is_current_poll(generation) {
                return PollOutcome::Cancelled;
            }
            if self.is_connected() {
                return PollOutcome::Linked;
            }

            let connected = self.fetch_status().await;
            if !self.is_current_poll(generation) {
                tracing::debug!("Discarding status from a superseded poll");
                return PollOutcome::Cancelled;
            }
            if connected {
                return PollOutcome::Linked;
            }
            tracing::trace!("Storage link not established yet");
        }
    }

    async fn finish_poll(&self, generation: u64, outcome: PollOutcome) {
        // The slot stays occupied until the outcome is visible in the view
        let mut slot = self.inner.poll.lock().await;
        if !self.is_current_poll(generation) {
            return;
        }

        let mut request = None;
        self.inner.view.send_modify(|view| {
            match outcome {
                PollOutcome::Linked if !view.is_connected() => {
                    view.link = LinkState::Connected;
                    request = self.issue_listing(view);
                }
                PollOutcome::TimedOut if view.link == LinkState::Connecting => {
                    view.link = LinkState::Disconnected;
                }
                _ => {}
            }
            view.last_poll = Some(outcome);
        });
        if slot.as_ref().map(|task| task.generation) == Some(generation) {
            slot.take();
        }
        drop(slot);

        match outcome {
            PollOutcome::TimedOut => tracing::warn!(
                "Storage authorization not completed within {:?}; stopped waiting",
                self.inner.poll_settings.timeout
            ),
            PollOutcome::Linked => tracing::debug!("Storage-link poll finished"),
            PollOutcome::Cancelled => tracing::debug!("Storage-link poll cancelled"),
        }

        // Nothing aborts this task once the slot is released
        if let Some(request) = request {
            tracing::info!("Storage account linked");
            self.complete_listing(request).await;
        }
    }

    fn is_current_poll(&self, generation: u64) -> bool {
        self.inner.poll_generation.load(Ordering::SeqCst) == generation
    }
}
