//! Configuration handling for the TUI

use crate::api::DEFAULT_ADDRESS;
use crate::state::{FlowType, UserType, DEFAULT_LOAD_MORE_DEBOUNCE, DEFAULT_PER_PAGE};
use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the API address
pub const API_URL_ENV: &str = "SIGNALS_API_URL";

/// User configuration for the TUI
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TuiConfig {
    /// API base URL
    pub api_base_url: Option<String>,
    /// Signal posts fetched per page
    pub per_page: Option<u32>,
    /// Quiet window for coalescing load-more triggers, in milliseconds
    pub load_more_debounce_ms: Option<u64>,
    /// Account type preselected in the signup wizard
    pub user_type: Option<UserType>,
    /// Email prefilled in the auth wizards
    pub last_email: Option<String>,
    /// Wizard shown at startup when signed out, by route name
    pub start_flow: Option<String>,
}

impl TuiConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "signals", "signals-tui")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if let Some(path) = path {
            if path.exists() {
                let content = fs::read_to_string(&path)?;
                let config: TuiConfig = serde_json::from_str(&content)?;
                return Ok(config);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(self)?;
            fs::write(&path, content)?;
        }
        Ok(())
    }

    /// API address: environment first, then config, then the built-in default
    pub fn resolved_api_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string())
    }

    /// Wizard to open when no session is restored; login unless configured
    pub fn start_flow(&self) -> FlowType {
        self.start_flow
            .as_deref()
            .filter(|route| !route.trim().is_empty())
            .map_or(FlowType::Login, FlowType::from_route)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.filter(|n| *n > 0).unwrap_or(DEFAULT_PER_PAGE)
    }

    pub fn load_more_debounce(&self) -> Duration {
        self.load_more_debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_LOAD_MORE_DEBOUNCE)
    }
}
