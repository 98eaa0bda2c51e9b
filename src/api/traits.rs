//! Trait abstraction for the Signals API to enable mocking in tests

use crate::state::{AuthTokens, FlowType, Page, SignalPost, SignalQuery, UserType};
use anyhow::Result;
use async_trait::async_trait;

/// Registration payload collected by the signup wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRequest {
    pub email: String,
    pub otp: String,
    pub username: String,
    pub password: String,
    pub user_type: UserType,
}

/// Trait for Signals API operations, enabling mocking in tests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalsApi: Send + Sync {
    /// Bearer token for authenticated calls; `None` after logout
    fn set_access_token(&self, token: Option<String>);

    /// Fetch one page of signal posts
    async fn fetch_signal_posts(
        &self,
        query: &SignalQuery,
        page: u32,
        per_page: u32,
    ) -> Result<Page<SignalPost>>;

    /// Send a one-time code to `email` for the given flow
    async fn send_email_otp(&self, email: &str, flow: &FlowType) -> Result<()>;

    /// Check a one-time code; `Ok(false)` means the code was wrong
    async fn verify_otp(&self, email: &str, code: &str) -> Result<bool>;

    /// Create an account
    async fn register(&self, request: &SignupRequest) -> Result<AuthTokens>;

    /// Sign in with a username or email
    async fn login(&self, identifier: &str, password: &str) -> Result<AuthTokens>;

    /// Set a new password using a verified code
    async fn reset_password(&self, email: &str, code: &str, password: &str) -> Result<()>;

    /// Exchange a refresh token for new tokens
    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens>;
}
