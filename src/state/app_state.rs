//! Application state definitions

use super::auth_flow::{AuthFlow, FlowType, UserType};
use super::pagination::PaginationState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current view in the application
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    /// One of the auth wizards
    #[default]
    Auth,
    /// Signal post feed
    Feed,
    /// Details of the selected post
    SignalDetail,
}

/// Trade direction of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Long,
    Short,
}

impl SignalDirection {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }
}

/// Author of a signal post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

impl AgentSummary {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// A trading signal published by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPost {
    pub id: String,
    pub agent: AgentSummary,
    pub symbol: String,
    pub direction: SignalDirection,
    pub entry_price: f64,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl SignalPost {
    /// Reward to risk ratio, when both targets are set
    pub fn risk_reward(&self) -> Option<f64> {
        let tp = self.take_profit?;
        let sl = self.stop_loss?;
        let risk = (self.entry_price - sl).abs();
        if risk == 0.0 {
            return None;
        }
        Some((tp - self.entry_price).abs() / risk)
    }
}

/// Filter for the signal feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Main application state
#[derive(Default)]
pub struct AppState {
    // Navigation
    pub current_view: View,

    // Auth
    pub auth: Option<AuthFlow>,
    pub user_type: UserType,

    // Feed
    pub feed: PaginationState<SignalPost>,
    pub query: SignalQuery,

    // Selection
    pub selected_index: usize,

    // Status line message
    pub status_message: Option<String>,
}

impl AppState {
    /// Open an auth wizard, discarding any flow in progress
    pub fn open_auth(&mut self, flow_type: FlowType) {
        self.auth = Some(AuthFlow::new(flow_type, self.user_type));
        self.current_view = View::Auth;
    }

    /// Move selection down
    pub fn move_selection_down(&mut self, max: usize) {
        if max > 0 && self.selected_index < max - 1 {
            self.selected_index += 1;
        }
    }

    /// Move selection up
    pub fn move_selection_up(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
        }
    }

    /// Reset selection
    pub fn reset_selection(&mut self) {
        self.selected_index = 0;
    }

    /// Selected row is within `threshold` rows of the end of the list
    pub fn near_list_end(&self, threshold: usize) -> bool {
        let len = self.feed.items().len();
        len > 0 && self.selected_index + threshold >= len - 1
    }

    pub fn selected_post(&self) -> Option<&SignalPost> {
        self.feed.items().get(self.selected_index)
    }
}
