//! HTTP client for the Signals API
//!
//! JSON over HTTPS. Non-2xx responses are turned into errors carrying the
//! server's `message` when it sends one.

use super::traits::{SignalsApi, SignupRequest};
use crate::state::{AuthTokens, FlowType, Page, SignalPost, SignalQuery};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;

/// Default API address
pub const DEFAULT_ADDRESS: &str = "https://api.signals.app/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verified: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtpRequest<'a> {
    email: &'a str,
    #[serde(rename = "type")]
    flow: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    email: &'a str,
    otp: &'a str,
    username: &'a str,
    password: &'a str,
    user_type: crate::state::UserType,
}

/// Client for the Signals REST API
pub struct ApiClient {
    http: Client,
    base_url: String,
    access_token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Create a client for `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.read().ok().and_then(|t| t.clone());
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.authorized(self.http.post(self.url(path)).json(body));
        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach {}: {}", path, e))?;
        decode(path, response).await
    }

    async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let request = self.authorized(self.http.post(self.url(path)).json(body));
        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach {}: {}", path, e))?;
        check_status(path, response).await.map(|_| ())
    }
}

async fn check_status(path: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.is_empty());
    tracing::debug!(path, %status, ?message, "api request failed");
    Err(match message {
        Some(message) => anyhow!(message),
        None => anyhow!("{} failed with status {}", path, status),
    })
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
    let response = check_status(path, response).await?;
    response
        .json::<T>()
        .await
        .with_context(|| format!("Unexpected response from {}", path))
}

/// Query string for a feed page
fn feed_params(query: &SignalQuery, page: u32, per_page: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("page", page.to_string()),
        ("perPage", per_page.to_string()),
    ];
    if let Some(agent_id) = &query.agent_id {
        params.push(("agentId", agent_id.clone()));
    }
    if let Some(symbol) = &query.symbol {
        params.push(("symbol", symbol.clone()));
    }
    params
}

#[async_trait]
impl SignalsApi for ApiClient {
    fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.access_token.write() {
            *slot = token;
        }
    }

    async fn fetch_signal_posts(
        &self,
        query: &SignalQuery,
        page: u32,
        per_page: u32,
    ) -> Result<Page<SignalPost>> {
        let path = "signals/posts";
        let request = self.authorized(
            self.http
                .get(self.url(path))
                .query(&feed_params(query, page, per_page)),
        );
        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Failed to load signals: {}", e))?;
        decode(path, response).await
    }

    async fn send_email_otp(&self, email: &str, flow: &FlowType) -> Result<()> {
        self.post_unit(
            "auth/email/otp",
            &OtpRequest {
                email,
                flow: flow.route(),
            },
        )
        .await
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<bool> {
        let body = serde_json::json!({ "email": email, "code": code });
        let response: VerifyResponse = self.post_json("auth/email/verify", &body).await?;
        Ok(response.verified)
    }

    async fn register(&self, request: &SignupRequest) -> Result<AuthTokens> {
        let body = RegisterBody {
            email: &request.email,
            otp: &request.otp,
            username: &request.username,
            password: &request.password,
            user_type: request.user_type,
        };
        self.post_json("auth/register", &body).await
    }

    async fn login(&self, identifier: &str, password: &str) -> Result<AuthTokens> {
        let body = serde_json::json!({ "identifier": identifier, "password": password });
        self.post_json("auth/login", &body).await
    }

    async fn reset_password(&self, email: &str, code: &str, password: &str) -> Result<()> {
        let body = serde_json::json!({ "email": email, "code": code, "password": password });
        self.post_unit("auth/password/reset", &body).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens> {
        let body = serde_json::json!({ "refreshToken": refresh_token });
        self.post_json("auth/token/refresh", &body).await
    }
}
