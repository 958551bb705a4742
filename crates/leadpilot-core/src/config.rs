//! LeadPilot configuration system.
//!
//! `BotSettings` is the process-wide settings document: loaded once at
//! startup, mutated only through the designated settings-update path, and
//! persisted on every change before the new value is handed to components.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LeadPilotError, Result};

/// Process-wide bot settings with an explicit lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Master switch for the autonomous loop.
    #[serde(default)]
    pub running: bool,
    /// Route every send to `test_phone` instead of the real lead.
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub test_phone: String,
    /// Spacing between consecutive autonomous sends.
    #[serde(default = "default_send_interval")]
    pub send_interval_secs: u64,
    #[serde(default = "bool_true")]
    pub inbound_enabled: bool,
    #[serde(default = "bool_true")]
    pub outbound_enabled: bool,
    /// Restrict dispatch to the allow-list below.
    #[serde(default = "bool_true")]
    pub security_lock: bool,
    /// Founder/test numbers that may always be contacted.
    #[serde(default)]
    pub allowed_phones: Vec<String>,
    /// Maximum outbound sends across all leads per day.
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u32,
    /// Per-lead cooldown applied after each send.
    #[serde(default = "default_per_message_delay")]
    pub per_message_delay_secs: u64,
    /// Intercept bot proposals for human review before dispatch.
    #[serde(default)]
    pub manual_approval: bool,
    /// Outside these windows, admitted sends are deferred rather than rejected.
    #[serde(default)]
    pub business_hours: Option<BusinessHours>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub textgen: TextGenConfig,
}

fn bool_true() -> bool {
    true
}
fn default_send_interval() -> u64 {
    60
}
fn default_daily_cap() -> u32 {
    25
}
fn default_per_message_delay() -> u64 {
    1800
}
fn default_data_dir() -> String {
    "~/.leadpilot".into()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            running: false,
            test_mode: false,
            test_phone: String::new(),
            send_interval_secs: default_send_interval(),
            inbound_enabled: true,
            outbound_enabled: true,
            security_lock: true,
            allowed_phones: Vec::new(),
            daily_cap: default_daily_cap(),
            per_message_delay_secs: default_per_message_delay(),
            manual_approval: false,
            business_hours: None,
            data_dir: default_data_dir(),
            bridge: BridgeConfig::default(),
            textgen: TextGenConfig::default(),
        }
    }
}

impl BotSettings {
    /// Load settings from the default path (~/.leadpilot/settings.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load settings from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LeadPilotError::Config(format!("Failed to read settings: {e}")))?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| LeadPilotError::Config(format!("Failed to parse settings: {e}")))?;
        Ok(settings)
    }

    /// Persist settings to the default path. The settings-update endpoint
    /// calls this before broadcasting the new value.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| LeadPilotError::Config(format!("Failed to serialize settings: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("settings.toml")
    }

    /// The LeadPilot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".leadpilot")
    }

    /// The resolved data directory (tilde-expanded).
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }
}

/// Local-time hour windows during which autonomous sends are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    /// Pairs of (start_hour, end_hour), end exclusive.
    pub windows: Vec<(u32, u32)>,
}

impl Default for BusinessHours {
    fn default() -> Self {
        // Morning and afternoon windows; avoids lunch and evenings.
        Self {
            windows: vec![(10, 12), (15, 20)],
        }
    }
}

impl BusinessHours {
    pub fn contains_hour(&self, hour: u32) -> bool {
        self.windows.iter().any(|(start, end)| hour >= *start && hour < *end)
    }
}

/// Messaging-bridge endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_session")]
    pub session: String,
    /// Short timeout so liveness probes never block status callers.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Container name used for best-effort bring-up.
    #[serde(default = "default_container")]
    pub container: String,
}

fn default_bridge_url() -> String {
    "http://localhost:3000".into()
}
fn default_session() -> String {
    "default".into()
}
fn default_probe_timeout() -> u64 {
    3
}
fn default_container() -> String {
    "leadpilot_bridge".into()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_bridge_url(),
            api_key: String::new(),
            session: default_session(),
            probe_timeout_secs: default_probe_timeout(),
            container: default_container(),
        }
    }
}

/// Text-generation service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGenConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Bounded: on timeout the composer falls back to the template.
    #[serde(default = "default_textgen_timeout")]
    pub timeout_secs: u64,
}

fn default_textgen_timeout() -> u64 {
    10
}

impl Default for TextGenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: default_textgen_timeout(),
        }
    }
}
