//! Signed-in session and its token expiry timer

use crate::events::AppEvent;
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use directories::ProjectDirs;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Keys cleared from the token store on logout
pub const SESSION_KEYS: &[&str] = &[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY];

/// Tokens issued by the API on login or registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("access token could not be decoded: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),
    #[error("access token expiry {0} is out of range")]
    ExpiryOutOfRange(i64),
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// Read the `exp` claim of a JWT.
///
/// The signature is not checked; the server does that on every request.
pub fn token_expiry(token: &str) -> Result<DateTime<Utc>, SessionError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Utc.timestamp_opt(data.claims.exp, 0)
        .single()
        .ok_or(SessionError::ExpiryOutOfRange(data.claims.exp))
}

/// Persistent key/value storage for session tokens
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, keys: &[&str]) -> Result<()>;
}

/// Token store backed by a JSON file in the user's data directory
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store under the platform data dir, if one can be determined
    pub fn default_location() -> Option<Self> {
        ProjectDirs::from("io", "signals", "signals-tui")
            .map(|dirs| Self::new(dirs.data_dir().join("session.json")))
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let entries = serde_json::from_str(&content)
            .with_context(|| format!("Malformed token store {}", self.path.display()))?;
        Ok(entries)
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.read_all()?;
        for key in keys {
            entries.remove(*key);
        }
        self.write_all(&entries)
    }
}

/// The signed-in user's tokens plus the timer that ends the session at
/// token expiry.
///
/// Every login, refresh and logout cancels the previous timer, so a timer
/// can only ever fire for the session that scheduled it.
pub struct Session {
    store: Arc<dyn TokenStore>,
    events: UnboundedSender<AppEvent>,
    tokens: Option<AuthTokens>,
    session_id: Option<Uuid>,
    expires_at: Option<DateTime<Utc>>,
    expiry_task: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            store,
            events,
            tokens: None,
            session_id: None,
            expires_at: None,
            expiry_task: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().and_then(|t| t.refresh_token.as_deref())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Begin a session with freshly issued tokens
    pub fn start(&mut self, tokens: AuthTokens) -> Result<()> {
        self.store.set(ACCESS_TOKEN_KEY, &tokens.access_token)?;
        match &tokens.refresh_token {
            Some(refresh) => self.store.set(REFRESH_TOKEN_KEY, refresh)?,
            None => self.store.remove(&[REFRESH_TOKEN_KEY])?,
        }
        self.activate(tokens);
        Ok(())
    }

    /// Swap in refreshed tokens and reschedule the expiry timer
    pub fn refresh(&mut self, tokens: AuthTokens) -> Result<()> {
        tracing::debug!("session tokens refreshed");
        self.start(tokens)
    }

    /// Resume a session persisted by an earlier run.
    ///
    /// Returns `false` when nothing usable was stored.
    pub fn restore(&mut self) -> Result<bool> {
        let Some(access_token) = self.store.get(ACCESS_TOKEN_KEY)? else {
            return Ok(false);
        };
        let expired = match token_expiry(&access_token) {
            Ok(expiry) => expiry <= Utc::now(),
            Err(_) => true,
        };
        if expired {
            tracing::info!("stored session expired, clearing");
            self.store.remove(SESSION_KEYS)?;
            return Ok(false);
        }

        let refresh_token = self.store.get(REFRESH_TOKEN_KEY)?;
        self.activate(AuthTokens {
            access_token,
            refresh_token,
        });
        Ok(true)
    }

    /// End the session and forget the stored tokens
    pub fn logout(&mut self) -> Result<()> {
        self.cancel_timer();
        self.tokens = None;
        self.session_id = None;
        self.expires_at = None;
        self.store.remove(SESSION_KEYS)?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Whether `session_id` names the session currently active
    pub fn is_current(&self, session_id: Uuid) -> bool {
        self.session_id == Some(session_id)
    }

    /// React to an expiry timer; returns true if it ended the current session
    pub fn handle_expired(&mut self, session_id: Uuid) -> Result<bool> {
        if !self.is_current(session_id) {
            tracing::debug!(%session_id, "ignoring expiry of a previous session");
            return Ok(false);
        }
        tracing::info!("access token expired, forcing logout");
        self.expiry_task = None;
        self.logout()?;
        Ok(true)
    }

    fn activate(&mut self, tokens: AuthTokens) {
        self.cancel_timer();
        let session_id = Uuid::new_v4();
        self.session_id = Some(session_id);

        self.expires_at = match token_expiry(&tokens.access_token) {
            Ok(expiry) => Some(expiry),
            Err(err) => {
                tracing::warn!(error = %err, "access token has no readable expiry");
                None
            }
        };
        self.tokens = Some(tokens);

        if let Some(expiry) = self.expires_at {
            let delay = (expiry - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            let deadline = tokio::time::Instant::now() + delay;
            let events = self.events.clone();
            self.expiry_task = Some(tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                let _ = events.send(AppEvent::SessionExpired(session_id));
            }));
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(task) = self.expiry_task.take() {
            task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
