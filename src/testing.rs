//! In-memory backend and fixtures shared by the store tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;

use crate::api::{AuthApi, ChatApi, DriveApi};
use crate::auth::CredentialReader;
use crate::drive::AuthorizationHandoff;
use crate::errors::ClientError;
use crate::models::{
    AuthResponse, Breadcrumb, ChatHistory, ChatMessage, ChatReply, ConnectResponse,
    ConnectionStatus, DriveEntry, EntryKind, FileUpload, Listing, User,
};
use crate::session::SessionSnapshot;

pub const AUTH_URL: &str = "https://accounts.example.com/o/oauth2/auth?state=xyz";

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

pub fn sample_user() -> User {
    User {
        id: "u-1".to_string(),
        email: "ada@example.com".to_string(),
        display_name: "Ada".to_string(),
        created_at: fixed_time(),
    }
}

pub fn entry(id: &str, name: &str, kind: EntryKind) -> DriveEntry {
    DriveEntry {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        mime_type: None,
        size_bytes: None,
        modified_at: fixed_time(),
        parent_id: None,
        view_url: None,
        thumbnail_url: None,
    }
}

pub fn crumb(id: &str, name: &str) -> Breadcrumb {
    Breadcrumb {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn listing(files: Vec<DriveEntry>, breadcrumbs: Vec<Breadcrumb>) -> Listing {
    Listing { files, breadcrumbs }
}

/// Session state with a signed-in user, as seen by the drive store.
pub fn signed_in() -> watch::Receiver<SessionSnapshot> {
    let (_tx, rx) = watch::channel(SessionSnapshot {
        user: Some(sample_user()),
        loading: false,
    });
    rx
}

pub fn signed_out() -> watch::Receiver<SessionSnapshot> {
    let (_tx, rx) = watch::channel(SessionSnapshot {
        user: None,
        loading: false,
    });
    rx
}

#[derive(Default)]
struct FakeState {
    credentials: Option<CredentialReader>,
    accounts: HashMap<String, (String, User)>,
    tokens: HashMap<String, User>,
    failing: HashSet<String>,
    log: Vec<String>,
    connected: bool,
    connect_after: Option<usize>,
    status_calls: usize,
    status_delay: Duration,
    auth_url: Option<String>,
    listings: HashMap<Option<String>, (Listing, Duration)>,
    list_requests: Vec<(Option<String>, Option<String>)>,
    uploads: Vec<(String, Option<String>)>,
    folders: Vec<(String, Option<String>)>,
    history: Vec<ChatMessage>,
}

/// Scriptable stand-in for all three backend service groups.
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let mut state = FakeState {
            auth_url: Some(AUTH_URL.to_string()),
            ..FakeState::default()
        };
        state.accounts.insert(
            "ada@example.com".to_string(),
            ("correct-horse".to_string(), sample_user()),
        );
        Self {
            state: Mutex::new(state),
        }
    }

    /// Let `profile` resolve whatever credential this reader currently holds.
    pub fn attach_credentials(&self, reader: CredentialReader) {
        self.state.lock().unwrap().credentials = Some(reader);
    }

    pub fn register_credential(&self, token: &str, user: User) {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(token.to_string(), user);
    }

    /// Make every later call of `op` fail with a server error.
    pub fn fail(&self, op: &str) {
        self.state.lock().unwrap().failing.insert(op.to_string());
    }

    pub fn recover(&self, op: &str) {
        self.state.lock().unwrap().failing.remove(op);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|entry| entry.as_str() == op)
            .count()
    }

    /// Every call made so far, in order.
    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().unwrap().connected = connected;
    }

    /// Report the link as established from the `n`th status check on.
    pub fn connect_after(&self, n: usize) {
        self.state.lock().unwrap().connect_after = Some(n);
    }

    pub fn set_status_delay(&self, delay: Duration) {
        self.state.lock().unwrap().status_delay = delay;
    }

    pub fn set_auth_url(&self, url: Option<&str>) {
        self.state.lock().unwrap().auth_url = url.map(str::to_string);
    }

    pub fn set_listing(&self, folder_id: Option<&str>, listing: Listing, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .listings
            .insert(folder_id.map(str::to_string), (listing, delay));
    }

    pub fn list_requests(&self) -> Vec<(Option<String>, Option<String>)> {
        self.state.lock().unwrap().list_requests.clone()
    }

    pub fn uploads(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn folders(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().folders.clone()
    }

    pub fn set_history(&self, messages: Vec<ChatMessage>) {
        self.state.lock().unwrap().history = messages;
    }

    fn enter(state: &mut FakeState, op: &str) -> Result<(), ClientError> {
        state.log.push(op.to_string());
        if state.failing.contains(op) {
            return Err(ClientError::Server {
                status: 500,
                message: format!("{} failed", op),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AuthApi for FakeBackend {
    async fn profile(&self) -> Result<User, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "profile")?;
        let credential = state
            .credentials
            .as_ref()
            .and_then(CredentialReader::credential);
        credential
            .and_then(|token| state.tokens.get(&token).cloned())
            .ok_or_else(|| ClientError::Unauthorized("Invalid or expired credential".to_string()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "sign_in")?;
        let user = match state.accounts.get(email) {
            Some((expected, user)) if expected == password => user.clone(),
            _ => {
                return Err(ClientError::Unauthorized(
                    "Invalid email or password".to_string(),
                ))
            }
        };
        let token = format!("tok-{}", user.id);
        state.tokens.insert(token.clone(), user.clone());
        Ok(AuthResponse {
            access_token: token,
            user,
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthResponse, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "sign_up")?;
        if state.accounts.contains_key(email) {
            return Err(ClientError::BadRequest(
                "Email already registered".to_string(),
            ));
        }
        let user = User {
            id: format!("u-{}", state.accounts.len() + 1),
            email: email.to_string(),
            display_name: display_name.to_string(),
            created_at: fixed_time(),
        };
        state
            .accounts
            .insert(email.to_string(), (password.to_string(), user.clone()));
        let token = format!("tok-{}", user.id);
        state.tokens.insert(token.clone(), user.clone());
        Ok(AuthResponse {
            access_token: token,
            user,
        })
    }

    async fn sign_out(&self, credential: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "sign_out")?;
        state.tokens.remove(credential);
        Ok(())
    }

    async fn delete_account(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "delete_account")
    }
}

#[async_trait]
impl DriveApi for FakeBackend {
    async fn connection_status(&self) -> Result<ConnectionStatus, ClientError> {
        let (result, delay) = {
            let mut state = self.state.lock().unwrap();
            state.status_calls += 1;
            if state.connect_after.map_or(false, |n| state.status_calls >= n) {
                state.connected = true;
            }
            let result = Self::enter(&mut state, "connection_status").map(|()| ConnectionStatus {
                connected: state.connected,
            });
            (result, state.status_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn begin_link(&self) -> Result<ConnectResponse, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "begin_link")?;
        Ok(ConnectResponse {
            auth_url: state.auth_url.clone(),
        })
    }

    async fn list_entries(
        &self,
        folder_id: Option<&str>,
        search: Option<&str>,
    ) -> Result<Listing, ClientError> {
        let (result, delay) = {
            let mut state = self.state.lock().unwrap();
            state
                .list_requests
                .push((folder_id.map(str::to_string), search.map(str::to_string)));
            let (listing, delay) = state
                .listings
                .get(&folder_id.map(str::to_string))
                .cloned()
                .unwrap_or_default();
            (
                Self::enter(&mut state, "list_entries").map(|()| listing),
                delay,
            )
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn upload_entry(
        &self,
        file: &FileUpload,
        parent_id: Option<&str>,
    ) -> Result<DriveEntry, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "upload_entry")?;
        state
            .uploads
            .push((file.name.clone(), parent_id.map(str::to_string)));
        let mut uploaded = entry(
            &format!("file-{}", state.uploads.len()),
            &file.name,
            EntryKind::File,
        );
        uploaded.mime_type = Some(file.mime_type.clone());
        uploaded.size_bytes = Some(file.bytes.len() as u64);
        uploaded.parent_id = parent_id.map(str::to_string);
        Ok(uploaded)
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveEntry, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "create_folder")?;
        state
            .folders
            .push((name.to_string(), parent_id.map(str::to_string)));
        let mut folder = entry(
            &format!("folder-{}", state.folders.len()),
            name,
            EntryKind::Folder,
        );
        folder.parent_id = parent_id.map(str::to_string);
        Ok(folder)
    }
}

#[async_trait]
impl ChatApi for FakeBackend {
    async fn history(&self) -> Result<ChatHistory, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "history")?;
        Ok(ChatHistory {
            messages: state.history.clone(),
        })
    }

    async fn initialize_index(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "initialize_index")
    }

    async fn send_message(&self, text: &str) -> Result<ChatReply, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::enter(&mut state, "send_message")?;
        Ok(ChatReply {
            response: format!("You asked: {}", text),
        })
    }
}

/// Handoff that records URLs instead of opening them.
#[derive(Default)]
pub struct RecordingHandoff {
    opened: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingHandoff {
    pub fn failing() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl AuthorizationHandoff for RecordingHandoff {
    fn open(&self, url: &str) -> Result<(), ClientError> {
        self.opened.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(ClientError::Transport("No browser available".to_string()));
        }
        Ok(())
    }
}
