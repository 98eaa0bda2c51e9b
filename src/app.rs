//! Application state and core logic

use crate::api::{ApiClient, SignalsApi, SignupRequest};
use crate::config::TuiConfig;
use crate::events::{AppEvent, AuthOutcome};
use crate::state::{
    AppState, AuthStep, FileTokenStore, FlowType, Form, PageRequest, PaginationState, Session,
    StepTransition, TokenStore, View,
};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Shown when an error carries no message of its own
pub const FALLBACK_ERROR: &str = "Something went wrong. Please try again.";

/// Rows from the end of the feed at which scrolling asks for more
const LOAD_MORE_THRESHOLD: usize = 3;

/// Turn an API error into the text shown to the user
pub fn error_message(err: &anyhow::Error) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        FALLBACK_ERROR.to_string()
    } else {
        message
    }
}

/// Main application struct
pub struct App {
    /// Current application state
    pub state: AppState,
    /// Signals API client
    api: Arc<dyn SignalsApi>,
    /// Signed-in session and its expiry timer
    pub session: Session,
    /// Persisted user preferences
    pub config: TuiConfig,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,
    /// Write config changes back to disk
    persist_config: bool,
    /// Whether the app should quit
    quit: bool,
}

impl App {
    /// Create a new App instance
    pub async fn new(config: TuiConfig) -> Result<Self> {
        let api = Arc::new(ApiClient::new(config.resolved_api_url())?);
        tracing::info!(api = api.base_url(), "using signals api");
        let store: Arc<dyn TokenStore> = Arc::new(
            FileTokenStore::default_location()
                .unwrap_or_else(|| FileTokenStore::new(PathBuf::from(".signals-session.json"))),
        );
        let mut app = Self::with_parts(config, api, store);
        app.persist_config = true;

        let restored = app.session.restore().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "could not restore session");
            false
        });
        if restored {
            app.api
                .set_access_token(app.session.access_token().map(str::to_string));
            app.show_feed();
        }
        Ok(app)
    }

    /// Assemble an app around the given collaborators, starting at the
    /// configured wizard
    pub fn with_parts(
        config: TuiConfig,
        api: Arc<dyn SignalsApi>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut state = AppState {
            feed: PaginationState::new(config.per_page(), config.load_more_debounce()),
            user_type: config.user_type.unwrap_or_default(),
            ..Default::default()
        };
        state.open_auth(config.start_flow());

        let mut app = Self {
            state,
            api,
            session: Session::new(store, events_tx.clone()),
            config,
            events_tx,
            events_rx,
            persist_config: false,
            quit: false,
        };
        app.prefill_email();
        app
    }

    /// Check if app should quit
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Periodic work: fire a debounced load-more once its window has passed
    pub fn tick(&mut self, now: Instant) {
        if let Some(request) = self.state.feed.poll_load_more(now) {
            self.spawn_feed_fetch(request);
        }
    }

    /// Apply every event that background tasks have delivered so far
    pub fn drain_events(&mut self) -> Result<()> {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event)?;
        }
        Ok(())
    }

    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.state.current_view {
            View::Auth => self.handle_auth_key(key),
            View::Feed => self.handle_feed_key(key),
            View::SignalDetail => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q')) {
                    self.state.current_view = View::Feed;
                }
                Ok(())
            }
        }
    }

    fn handle_auth_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('n') => self.open_flow(FlowType::Signup),
                KeyCode::Char('r') => self.open_flow(FlowType::ForgotPassword),
                KeyCode::Char('l') => self.open_flow(FlowType::Login),
                KeyCode::Char('t') => {
                    self.state.user_type = self.state.user_type.toggle();
                    if let Some(flow) = self.state.auth.as_mut() {
                        flow.user_type = self.state.user_type;
                    }
                }
                _ => {}
            }
            return Ok(());
        }

        let Some(flow) = self.state.auth.as_mut() else {
            return Ok(());
        };
        if flow.busy {
            return Ok(());
        }

        match key.code {
            KeyCode::Esc => {
                if !flow.go_back() {
                    if *flow.flow_type() == FlowType::Login {
                        self.quit = true;
                    } else {
                        self.open_flow(FlowType::Login);
                    }
                }
            }
            KeyCode::Tab | KeyCode::Down => flow.next_field(),
            KeyCode::BackTab | KeyCode::Up => flow.prev_field(),
            KeyCode::Backspace => {
                if let Some(field) = flow.get_active_field_mut() {
                    field.pop_char();
                }
            }
            KeyCode::Char(c) => {
                if let Some(field) = flow.get_active_field_mut() {
                    field.push_char(c);
                }
            }
            KeyCode::Enter => self.submit_auth_step(),
            _ => {}
        }
        Ok(())
    }

    fn handle_feed_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.state.feed.items().len();
                self.state.move_selection_down(len);
                if self.state.near_list_end(LOAD_MORE_THRESHOLD) {
                    self.state.feed.trigger_load_more(Instant::now());
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.state.move_selection_up(),
            KeyCode::Enter => {
                if self.state.selected_post().is_some() {
                    self.state.current_view = View::SignalDetail;
                }
            }
            KeyCode::Char('r') => self.refresh_feed(),
            KeyCode::Char('l') => {
                let message = match self.session.logout() {
                    Ok(()) => "Logged out".to_string(),
                    Err(err) => {
                        tracing::warn!(error = %err, "could not clear stored session");
                        format!("Logged out, but the saved session was not removed: {err}")
                    }
                };
                self.api.set_access_token(None);
                self.open_flow(FlowType::Login);
                self.state.status_message = Some(message);
            }
            _ => {}
        }
        Ok(())
    }

    fn open_flow(&mut self, flow_type: FlowType) {
        self.state.open_auth(flow_type);
        self.prefill_email();
    }

    fn prefill_email(&mut self) {
        let Some(email) = self.config.last_email.clone() else {
            return;
        };
        if let Some(flow) = self.state.auth.as_mut() {
            match flow.step() {
                AuthStep::Credentials => flow.fields.username.set_text(email),
                _ => flow.fields.email.set_text(email),
            }
        }
    }

    /// Validate the current step locally, then confirm it remotely if needed
    fn submit_auth_step(&mut self) {
        let Some(flow) = self.state.auth.as_mut() else {
            return;
        };
        if flow.is_complete() {
            return;
        }
        if let Err(err) = flow.check_step() {
            flow.error = Some(err.to_string());
            return;
        }

        let flow_id = flow.id();
        let step = flow.step_number();
        let flow_type = flow.flow_type().clone();
        let fields = flow.fields.clone();
        let email = fields.normalized_email();
        let api = self.api.clone();
        let tx = self.events_tx.clone();

        let is_signup = flow_type == FlowType::Signup;

        match (flow.step(), is_signup) {
            (AuthStep::ProfileDetails | AuthStep::SetPassword, _) => {
                flow.advance(true);
                return;
            }
            (AuthStep::EmailEntry, _) => {
                tokio::spawn(async move {
                    let result = api
                        .send_email_otp(&email, &flow_type)
                        .await
                        .map(|_| AuthOutcome::Confirmed(true))
                        .map_err(|e| error_message(&e));
                    let _ = tx.send(AppEvent::Auth {
                        flow_id,
                        step,
                        result,
                    });
                });
            }
            (AuthStep::OtpVerify, _) => {
                let code = fields.otp.as_text().to_string();
                tokio::spawn(async move {
                    let result = api
                        .verify_otp(&email, &code)
                        .await
                        .map(AuthOutcome::Confirmed)
                        .map_err(|e| error_message(&e));
                    let _ = tx.send(AppEvent::Auth {
                        flow_id,
                        step,
                        result,
                    });
                });
            }
            (AuthStep::ConfirmPassword, true) => {
                let request = SignupRequest {
                    email,
                    otp: fields.otp.as_text().to_string(),
                    username: fields.username.as_text().trim().to_string(),
                    password: fields.password.as_text().to_string(),
                    user_type: flow.user_type,
                };
                tokio::spawn(async move {
                    let result = api
                        .register(&request)
                        .await
                        .map(AuthOutcome::SignedIn)
                        .map_err(|e| error_message(&e));
                    let _ = tx.send(AppEvent::Auth {
                        flow_id,
                        step,
                        result,
                    });
                });
            }
            (AuthStep::ConfirmPassword, _) => {
                let code = fields.otp.as_text().to_string();
                let password = fields.password.as_text().to_string();
                tokio::spawn(async move {
                    let result = api
                        .reset_password(&email, &code, &password)
                        .await
                        .map(|_| AuthOutcome::PasswordReset)
                        .map_err(|e| error_message(&e));
                    let _ = tx.send(AppEvent::Auth {
                        flow_id,
                        step,
                        result,
                    });
                });
            }
            (AuthStep::Credentials, _) => {
                let identifier = fields.username.as_text().trim().to_string();
                let password = fields.password.as_text().to_string();
                tokio::spawn(async move {
                    let result = api
                        .login(&identifier, &password)
                        .await
                        .map(AuthOutcome::SignedIn)
                        .map_err(|e| error_message(&e));
                    let _ = tx.send(AppEvent::Auth {
                        flow_id,
                        step,
                        result,
                    });
                });
            }
        }

        flow.busy = true;
        flow.error = None;
    }

    /// Apply one background event to the state
    pub fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::FeedPage { request, result } => {
                if self.state.feed.settle(request, result) && request.page == 1 {
                    self.state.reset_selection();
                }
            }
            AppEvent::Auth {
                flow_id,
                step,
                result,
            } => self.handle_auth_result(flow_id, step, result),
            AppEvent::SessionExpired(session_id) => {
                if !self.session.is_current(session_id) {
                    return Ok(());
                }
                match self.session.refresh_token().map(str::to_string) {
                    Some(refresh_token) => {
                        let api = self.api.clone();
                        let tx = self.events_tx.clone();
                        tokio::spawn(async move {
                            let result = api
                                .refresh_token(&refresh_token)
                                .await
                                .map_err(|e| error_message(&e));
                            let _ = tx.send(AppEvent::TokensRefreshed { session_id, result });
                        });
                    }
                    None => self.end_expired_session(session_id),
                }
            }
            AppEvent::TokensRefreshed { session_id, result } => {
                if !self.session.is_current(session_id) {
                    return Ok(());
                }
                let refreshed = result.and_then(|tokens| {
                    let access_token = tokens.access_token.clone();
                    self.session
                        .refresh(tokens)
                        .map(|_| access_token)
                        .map_err(|e| error_message(&e))
                });
                match refreshed {
                    Ok(access_token) => self.api.set_access_token(Some(access_token)),
                    Err(err) => {
                        tracing::warn!(error = %err, "token refresh failed");
                        self.end_expired_session(session_id);
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_auth_result(&mut self, flow_id: Uuid, step: u32, result: Result<AuthOutcome, String>) {
        let Some(flow) = self.state.auth.as_mut() else {
            return;
        };
        if flow.id() != flow_id || flow.step_number() != step || !flow.busy {
            tracing::debug!(step, current = flow.step_number(), "ignoring stale auth result");
            return;
        }
        flow.busy = false;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(message) => {
                flow.error = Some(message);
                return;
            }
        };

        match outcome {
            AuthOutcome::Confirmed(confirmed) => {
                if let StepTransition::Stayed(_) = flow.advance(confirmed) {
                    flow.fields.otp.clear();
                    flow.error = Some("That code is not valid".to_string());
                }
            }
            AuthOutcome::SignedIn(tokens) => {
                let access_token = tokens.access_token.clone();
                if let Err(err) = self.session.start(tokens) {
                    tracing::warn!(error = %err, "could not store session");
                    flow.error = Some(error_message(&err));
                    return;
                }
                flow.advance(true);
                let email = flow.fields.normalized_email();
                self.api.set_access_token(Some(access_token));
                self.remember_email(email);
                self.state.auth = None;
                self.show_feed();
            }
            AuthOutcome::PasswordReset => {
                flow.advance(true);
                let email = flow.fields.normalized_email();
                self.remember_email(email);
                self.open_flow(FlowType::Login);
                self.state.status_message =
                    Some("Password updated. Sign in with your new password.".to_string());
            }
        }
    }

    fn end_expired_session(&mut self, session_id: Uuid) {
        let ended = match self.session.handle_expired(session_id) {
            Ok(ended) => ended,
            // The session is already gone from memory; only the store kept it
            Err(err) => {
                tracing::warn!(error = %err, "could not clear stored session");
                true
            }
        };
        if ended {
            self.api.set_access_token(None);
            self.open_flow(FlowType::Login);
            self.state.status_message = Some("Your session expired. Please sign in again.".to_string());
        }
    }

    fn remember_email(&mut self, email: String) {
        if email.is_empty() || self.config.last_email.as_deref() == Some(email.as_str()) {
            return;
        }
        self.config.last_email = Some(email);
        if !self.persist_config {
            return;
        }
        if let Err(err) = self.config.save() {
            tracing::warn!(error = %err, "could not save config");
        }
    }

    fn show_feed(&mut self) {
        self.state.current_view = View::Feed;
        self.state.status_message = None;
        self.refresh_feed();
    }

    /// Reload the feed from page 1
    pub fn refresh_feed(&mut self) {
        let request = self.state.feed.refresh();
        self.spawn_feed_fetch(request);
    }

    fn spawn_feed_fetch(&self, request: PageRequest) {
        let api = self.api.clone();
        let query = self.state.query.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api
                .fetch_signal_posts(&query, request.page, request.per_page)
                .await
                .map_err(|e| error_message(&e));
            let _ = tx.send(AppEvent::FeedPage { request, result });
        });
    }

    /// Wait for the next background event and apply it
    #[cfg(test)]
    async fn process_next_event(&mut self) -> Result<()> {
        if let Some(event) = self.events_rx.recv().await {
            self.handle_event(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockSignalsApi;
    use crate::state::fixtures::signal;
    use crate::state::{AuthTokens, Page, TokenStore, UserType, ACCESS_TOKEN_KEY};
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MemoryTokenStore {
        entries: Mutex<HashMap<String, String>>,
    }

    impl TokenStore for MemoryTokenStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }
        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
        fn remove(&self, keys: &[&str]) -> Result<()> {
            let mut entries = self.entries.lock().unwrap();
            for key in keys {
                entries.remove(*key);
            }
            Ok(())
        }
    }

    /// Keeps the access token once written
    #[derive(Default)]
    struct StickyTokenStore {
        inner: MemoryTokenStore,
    }

    impl TokenStore for StickyTokenStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value)
        }
        fn remove(&self, keys: &[&str]) -> Result<()> {
            if keys.contains(&ACCESS_TOKEN_KEY) {
                return Err(anyhow::anyhow!("store is read-only"));
            }
            self.inner.remove(keys)
        }
    }

    fn tokens() -> AuthTokens {
        #[derive(serde::Serialize)]
        struct Claims {
            exp: i64,
        }
        let access_token = encode(
            &Header::default(),
            &Claims {
                exp: Utc::now().timestamp() + 3600,
            },
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        AuthTokens {
            access_token,
            refresh_token: None,
        }
    }

    fn mock_api() -> MockSignalsApi {
        let mut api = MockSignalsApi::new();
        api.expect_set_access_token().returning(|_| ());
        api
    }

    fn create_app(api: MockSignalsApi) -> App {
        App::with_parts(
            TuiConfig::default(),
            Arc::new(api),
            Arc::new(MemoryTokenStore::default()),
        )
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).unwrap();
    }

    fn ctrl(app: &mut App, c: char) {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
            .unwrap();
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn auth_step(app: &App) -> u32 {
        app.state.auth.as_ref().unwrap().step_number()
    }

    mod auth {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_starts_on_login() {
            let app = create_app(mock_api());
            assert_eq!(app.state.current_view, View::Auth);
            assert_eq!(
                app.state.auth.as_ref().unwrap().flow_type(),
                &FlowType::Login
            );
            assert!(!app.should_quit());
        }

        #[tokio::test]
        async fn test_invalid_email_does_not_call_api() {
            let mut app = create_app(mock_api());
            ctrl(&mut app, 'r');
            type_text(&mut app, "not-an-email");
            press(&mut app, KeyCode::Enter);

            let flow = app.state.auth.as_ref().unwrap();
            assert_eq!(flow.step_number(), 1);
            assert!(!flow.busy);
            assert_eq!(flow.error.as_deref(), Some("Please enter a valid email address"));
        }

        #[tokio::test]
        async fn test_forgot_password_flow_skips_step_three() {
            let mut api = mock_api();
            api.expect_send_email_otp()
                .withf(|email, flow| email == "user@example.com" && *flow == FlowType::ForgotPassword)
                .times(1)
                .returning(|_, _| Ok(()));
            api.expect_verify_otp()
                .withf(|email, code| email == "user@example.com" && code == "123456")
                .times(1)
                .returning(|_, _| Ok(true));
            api.expect_reset_password()
                .withf(|_, code, password| code == "123456" && password == "new-password")
                .times(1)
                .returning(|_, _, _| Ok(()));
            let mut app = create_app(api);

            ctrl(&mut app, 'r');
            type_text(&mut app, "User@Example.com");
            press(&mut app, KeyCode::Enter);
            assert!(app.state.auth.as_ref().unwrap().busy);
            app.process_next_event().await.unwrap();
            assert_eq!(auth_step(&app), 2);

            type_text(&mut app, "123456");
            press(&mut app, KeyCode::Enter);
            app.process_next_event().await.unwrap();
            assert_eq!(auth_step(&app), 4);

            type_text(&mut app, "new-password");
            press(&mut app, KeyCode::Enter);
            assert_eq!(auth_step(&app), 5);

            type_text(&mut app, "new-password");
            press(&mut app, KeyCode::Enter);
            app.process_next_event().await.unwrap();

            let flow = app.state.auth.as_ref().unwrap();
            assert_eq!(flow.flow_type(), &FlowType::Login);
            assert_eq!(flow.fields.username.as_text(), "user@example.com");
            assert!(app.state.status_message.is_some());
        }

        #[tokio::test]
        async fn test_wrong_otp_stays_on_step() {
            let mut api = mock_api();
            api.expect_send_email_otp().returning(|_, _| Ok(()));
            api.expect_verify_otp().returning(|_, _| Ok(false));
            let mut app = create_app(api);

            ctrl(&mut app, 'n');
            type_text(&mut app, "new@trader.io");
            press(&mut app, KeyCode::Enter);
            app.process_next_event().await.unwrap();
            type_text(&mut app, "000000");
            press(&mut app, KeyCode::Enter);
            app.process_next_event().await.unwrap();

            let flow = app.state.auth.as_ref().unwrap();
            assert_eq!(flow.step_number(), 2);
            assert_eq!(flow.error.as_deref(), Some("That code is not valid"));
            assert!(flow.fields.otp.is_empty());
        }

        #[tokio::test]
        async fn test_api_error_is_shown_and_step_kept() {
            let mut api = mock_api();
            api.expect_send_email_otp()
                .returning(|_, _| Err(anyhow::anyhow!("Email is not registered")));
            let mut app = create_app(api);

            ctrl(&mut app, 'r');
            type_text(&mut app, "ghost@example.com");
            press(&mut app, KeyCode::Enter);
            app.process_next_event().await.unwrap();

            let flow = app.state.auth.as_ref().unwrap();
            assert_eq!(flow.step_number(), 1);
            assert!(!flow.busy);
            assert_eq!(flow.error.as_deref(), Some("Email is not registered"));
        }

        #[tokio::test]
        async fn test_signup_registers_with_user_type() {
            let mut api = mock_api();
            api.expect_send_email_otp().returning(|_, _| Ok(()));
            api.expect_verify_otp().returning(|_, _| Ok(true));
            api.expect_register()
                .withf(|request| {
                    request.email == "desk@fund.io"
                        && request.username == "alpha_desk"
                        && request.user_type == UserType::SignalProvider
                })
                .times(1)
                .returning(|_| Ok(tokens()));
            api.expect_fetch_signal_posts().returning(|_, _, _| {
                Ok(Page {
                    data: vec![],
                    has_next_page: false,
                })
            });
            let mut app = create_app(api);

            ctrl(&mut app, 'n');
            ctrl(&mut app, 't');
            assert_eq!(
                app.state.auth.as_ref().unwrap().title(),
                "Enter your business email"
            );
            type_text(&mut app, "desk@fund.io");
            press(&mut app, KeyCode::Enter);
            app.process_next_event().await.unwrap();
            type_text(&mut app, "123456");
            press(&mut app, KeyCode::Enter);
            app.process_next_event().await.unwrap();
            assert_eq!(auth_step(&app), 3);
            type_text(&mut app, "alpha_desk");
            press(&mut app, KeyCode::Enter);
            type_text(&mut app, "long-password");
            press(&mut app, KeyCode::Enter);
            type_text(&mut app, "long-password");
            press(&mut app, KeyCode::Enter);
            app.process_next_event().await.unwrap();

            assert_eq!(app.state.current_view, View::Feed);
            assert!(app.state.auth.is_none());
            assert!(app.session.is_authenticated());
        }

        #[tokio::test]
        async fn test_input_ignored_while_busy() {
            let mut api = mock_api();
            api.expect_login().returning(|_, _| Ok(tokens()));
            api.expect_fetch_signal_posts().returning(|_, _, _| {
                Ok(Page {
                    data: vec![],
                    has_next_page: false,
                })
            });
            let mut app = create_app(api);
            type_text(&mut app, "alice");
            press(&mut app, KeyCode::Tab);
            type_text(&mut app, "pw");
            press(&mut app, KeyCode::Enter);
            type_text(&mut app, "zzz");
            assert_eq!(
                app.state.auth.as_ref().unwrap().fields.password.as_text(),
                "pw"
            );
            app.process_next_event().await.unwrap();
            assert_eq!(app.state.current_view, View::Feed);
        }

        #[tokio::test]
        async fn test_reply_for_replaced_flow_is_dropped() {
            let mut api = mock_api();
            api.expect_login().returning(|_, _| Ok(tokens()));
            api.expect_send_email_otp().returning(|_, _| Ok(()));
            let mut app = create_app(api);

            type_text(&mut app, "alice");
            press(&mut app, KeyCode::Tab);
            type_text(&mut app, "pw");
            press(&mut app, KeyCode::Enter);
            ctrl(&mut app, 'r');
            type_text(&mut app, "bob@example.com");
            press(&mut app, KeyCode::Enter);
            let reset_id = app.state.auth.as_ref().unwrap().id();

            // Both replies arrive; only the reset one belongs to the open wizard
            app.process_next_event().await.unwrap();
            app.process_next_event().await.unwrap();

            assert_eq!(app.state.current_view, View::Auth);
            assert!(!app.session.is_authenticated());
            let flow = app.state.auth.as_ref().unwrap();
            assert_eq!(flow.id(), reset_id);
            assert_eq!(flow.flow_type(), &FlowType::ForgotPassword);
            assert_eq!(flow.step_number(), 2);
            assert!(!flow.busy);
        }

        #[tokio::test]
        async fn test_unreadable_token_store_keeps_login_open() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("session.json");
            std::fs::write(&path, "not json").unwrap();

            let mut api = mock_api();
            api.expect_login().returning(|_, _| Ok(tokens()));
            let mut app = App::with_parts(
                TuiConfig::default(),
                Arc::new(api),
                Arc::new(FileTokenStore::new(path)),
            );

            type_text(&mut app, "alice");
            press(&mut app, KeyCode::Tab);
            type_text(&mut app, "password");
            press(&mut app, KeyCode::Enter);
            app.process_next_event().await.unwrap();

            assert_eq!(app.state.current_view, View::Auth);
            assert!(!app.session.is_authenticated());
            let flow = app.state.auth.as_ref().unwrap();
            assert!(!flow.is_complete());
            assert!(!flow.busy);
            assert!(flow
                .error
                .as_deref()
                .is_some_and(|e| e.starts_with("Malformed token store")));
        }

        #[tokio::test]
        async fn test_configured_start_flow() {
            let config = TuiConfig {
                start_flow: Some("signup".to_string()),
                ..Default::default()
            };
            let app = App::with_parts(
                config,
                Arc::new(mock_api()),
                Arc::new(MemoryTokenStore::default()),
            );
            let flow = app.state.auth.as_ref().unwrap();
            assert_eq!(flow.flow_type(), &FlowType::Signup);
            assert_eq!(flow.step(), AuthStep::EmailEntry);
        }

        #[tokio::test]
        async fn test_escape_on_login_quits() {
            let mut app = create_app(mock_api());
            press(&mut app, KeyCode::Esc);
            assert!(app.should_quit());
        }

        #[tokio::test]
        async fn test_escape_on_first_reset_step_returns_to_login() {
            let mut app = create_app(mock_api());
            ctrl(&mut app, 'r');
            press(&mut app, KeyCode::Esc);
            assert_eq!(
                app.state.auth.as_ref().unwrap().flow_type(),
                &FlowType::Login
            );
            assert!(!app.should_quit());
        }
    }

    mod feed {
        use super::*;
        use pretty_assertions::assert_eq;

        fn page_of(ids: std::ops::Range<u32>, has_next_page: bool) -> Page<crate::state::SignalPost> {
            Page {
                data: ids.map(|i| signal(&i.to_string(), "BTCUSDT")).collect(),
                has_next_page,
            }
        }

        async fn signed_in_app(api: MockSignalsApi) -> App {
            let mut app = create_app(api);
            app.session.start(tokens()).unwrap();
            app.show_feed();
            app.process_next_event().await.unwrap();
            app
        }

        #[tokio::test]
        async fn test_first_page_loads_on_sign_in() {
            let mut api = mock_api();
            api.expect_fetch_signal_posts()
                .withf(|_, page, per_page| *page == 1 && *per_page == 20)
                .returning(|_, _, _| Ok(page_of(0..20, true)));
            let app = signed_in_app(api).await;

            assert_eq!(app.state.feed.items().len(), 20);
            assert!(app.state.feed.has_next_page());
            assert!(!app.state.feed.is_loading());
        }

        #[tokio::test]
        async fn test_scrolling_to_end_loads_one_more_page() {
            let mut api = mock_api();
            api.expect_fetch_signal_posts()
                .withf(|_, page, _| *page == 1)
                .times(1)
                .returning(|_, _, _| Ok(page_of(0..5, true)));
            api.expect_fetch_signal_posts()
                .withf(|_, page, _| *page == 2)
                .times(1)
                .returning(|_, _, _| Ok(page_of(5..8, false)));
            let mut app = signed_in_app(api).await;

            for _ in 0..4 {
                press(&mut app, KeyCode::Down);
            }
            assert!(app.state.feed.has_pending_trigger());
            app.tick(Instant::now() + Duration::from_secs(1));
            assert!(app.state.feed.is_loading_more());
            app.tick(Instant::now() + Duration::from_secs(2));
            app.process_next_event().await.unwrap();

            assert_eq!(app.state.feed.page(), 2);
            assert_eq!(app.state.feed.items().len(), 8);
            assert!(!app.state.feed.has_next_page());
            assert_eq!(app.state.selected_index, 4);
        }

        #[tokio::test]
        async fn test_fetch_failure_shows_error_state() {
            let mut api = mock_api();
            api.expect_fetch_signal_posts()
                .returning(|_, _, _| Err(anyhow::anyhow!("connection refused")));
            let app = signed_in_app(api).await;

            assert!(app.state.feed.is_empty_state());
            assert_eq!(app.state.feed.error(), Some("connection refused"));
        }

        #[tokio::test]
        async fn test_logout_returns_to_login() {
            let mut api = mock_api();
            api.expect_fetch_signal_posts()
                .returning(|_, _, _| Ok(page_of(0..1, false)));
            let mut app = signed_in_app(api).await;

            press(&mut app, KeyCode::Char('l'));
            assert!(!app.session.is_authenticated());
            assert_eq!(app.state.current_view, View::Auth);
        }

        #[tokio::test]
        async fn test_enter_opens_detail_and_escape_returns() {
            let mut api = mock_api();
            api.expect_fetch_signal_posts()
                .returning(|_, _, _| Ok(page_of(0..2, false)));
            let mut app = signed_in_app(api).await;

            press(&mut app, KeyCode::Enter);
            assert_eq!(app.state.current_view, View::SignalDetail);
            press(&mut app, KeyCode::Esc);
            assert_eq!(app.state.current_view, View::Feed);
        }

        #[tokio::test]
        async fn test_expiry_without_refresh_token_forces_login() {
            let mut api = mock_api();
            api.expect_fetch_signal_posts()
                .returning(|_, _, _| Ok(page_of(0..1, false)));
            let mut app = signed_in_app(api).await;

            let id = app.session.session_id().unwrap();
            app.handle_event(AppEvent::SessionExpired(id)).unwrap();
            assert!(!app.session.is_authenticated());
            assert_eq!(app.state.current_view, View::Auth);
        }

        #[tokio::test]
        async fn test_expiry_with_refresh_token_renews_session() {
            let mut api = mock_api();
            api.expect_fetch_signal_posts()
                .returning(|_, _, _| Ok(page_of(0..1, false)));
            api.expect_refresh_token()
                .withf(|token| token == "refresh-1")
                .times(1)
                .returning(|_| Ok(tokens()));
            let mut app = signed_in_app(api).await;
            app.session
                .refresh(AuthTokens {
                    refresh_token: Some("refresh-1".to_string()),
                    ..tokens()
                })
                .unwrap();

            let id = app.session.session_id().unwrap();
            app.handle_event(AppEvent::SessionExpired(id)).unwrap();
            app.process_next_event().await.unwrap();

            assert!(app.session.is_authenticated());
            assert_ne!(app.session.session_id(), Some(id));
            assert_eq!(app.state.current_view, View::Feed);
        }

        #[tokio::test]
        async fn test_logout_survives_store_failure() {
            let mut api = mock_api();
            api.expect_fetch_signal_posts()
                .returning(|_, _, _| Ok(page_of(0..1, false)));
            let mut app = App::with_parts(
                TuiConfig::default(),
                Arc::new(api),
                Arc::new(StickyTokenStore::default()),
            );
            app.session.start(tokens()).unwrap();
            app.show_feed();
            app.process_next_event().await.unwrap();

            press(&mut app, KeyCode::Char('l'));
            assert!(!app.session.is_authenticated());
            assert_eq!(app.state.current_view, View::Auth);
            assert!(app
                .state
                .status_message
                .as_deref()
                .is_some_and(|m| m.starts_with("Logged out, but")));
        }

        #[tokio::test]
        async fn test_expiry_survives_store_failure() {
            let mut api = mock_api();
            api.expect_fetch_signal_posts()
                .returning(|_, _, _| Ok(page_of(0..1, false)));
            let mut app = App::with_parts(
                TuiConfig::default(),
                Arc::new(api),
                Arc::new(StickyTokenStore::default()),
            );
            app.session.start(tokens()).unwrap();

            let id = app.session.session_id().unwrap();
            app.handle_event(AppEvent::SessionExpired(id)).unwrap();
            assert!(!app.session.is_authenticated());
            assert_eq!(app.state.current_view, View::Auth);
        }

        #[tokio::test]
        async fn test_stale_expiry_is_ignored() {
            let mut api = mock_api();
            api.expect_fetch_signal_posts()
                .returning(|_, _, _| Ok(page_of(0..1, false)));
            let mut app = signed_in_app(api).await;

            app.handle_event(AppEvent::SessionExpired(uuid::Uuid::new_v4()))
                .unwrap();
            assert!(app.session.is_authenticated());
        }
    }

    #[test]
    fn test_error_message_fallback() {
        assert_eq!(error_message(&anyhow::anyhow!("")), FALLBACK_ERROR);
        assert_eq!(error_message(&anyhow::anyhow!("nope")), "nope");
    }
}
