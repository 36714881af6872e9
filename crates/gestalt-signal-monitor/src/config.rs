/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed monitor configuration (endpoints, wallet, stream tuning, triggers)
[POS]:    Configuration layer - startup settings
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail, ensure};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::stream::{BackoffConfig, DEFAULT_HISTORY_LIMIT, SessionConfig};

/// Top-level configuration for the signal monitor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    /// Where the verified wallet session is persisted between runs
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub triggers: TriggerSettings,
}

/// Signal engine endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// WebSocket URL of the live stream (e.g. "ws://localhost:8765")
    pub ws_url: String,
    /// Base URL of the auth API (e.g. "http://localhost:8766")
    pub auth_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
    /// Expected wallet address; login is refused if the key derives another one
    #[serde(default)]
    pub address: Option<String>,
    /// Environment variable holding the hex private key
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            address: None,
            private_key_env: default_private_key_env(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamSettings {
    pub connect_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub force_reconnect_grace_ms: u64,
    pub history_limit: usize,
    pub backoff: BackoffConfig,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            heartbeat_interval_ms: 25_000,
            force_reconnect_grace_ms: 100,
            history_limit: DEFAULT_HISTORY_LIMIT,
            backoff: BackoffConfig::default(),
        }
    }
}

impl StreamSettings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            force_reconnect_grace: Duration::from_millis(self.force_reconnect_grace_ms),
            history_limit: self.history_limit,
            backoff: self.backoff.clone(),
        }
    }
}

/// Recovery trigger sources; 0 disables a source
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TriggerSettings {
    pub connectivity_probe_secs: u64,
    pub suspend_check_secs: u64,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            connectivity_probe_secs: 5,
            suspend_check_secs: 5,
        }
    }
}

impl MonitorConfig {
    /// Load and validate configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let ws_url = Url::parse(&self.server.ws_url).context("server.ws_url")?;
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            bail!("server.ws_url must use ws:// or wss://, got {}", ws_url.scheme());
        }
        let auth_url = Url::parse(&self.server.auth_url).context("server.auth_url")?;
        if !matches!(auth_url.scheme(), "http" | "https") {
            bail!("server.auth_url must use http:// or https://, got {}", auth_url.scheme());
        }

        ensure!(
            !self.wallet.private_key_env.trim().is_empty(),
            "wallet.private_key_env must not be empty"
        );
        if let Some(address) = &self.wallet.address {
            gestalt_signal_adapter::auth::normalize_address(address)
                .map_err(|err| anyhow::anyhow!("wallet.address: {err}"))?;
        }

        let stream = &self.stream;
        ensure!(stream.connect_timeout_ms > 0, "stream.connect_timeout_ms must be > 0");
        ensure!(stream.heartbeat_interval_ms > 0, "stream.heartbeat_interval_ms must be > 0");
        ensure!(stream.history_limit > 0, "stream.history_limit must be > 0");

        let backoff = &stream.backoff;
        ensure!(backoff.base_delay_ms > 0, "stream.backoff.base_delay_ms must be > 0");
        ensure!(
            backoff.growth.is_finite() && backoff.growth >= 1.0,
            "stream.backoff.growth must be >= 1.0"
        );
        ensure!(
            backoff.max_delay_ms >= backoff.base_delay_ms,
            "stream.backoff.max_delay_ms must be >= base_delay_ms"
        );
        Ok(())
    }

    /// Session file path, defaulting to the platform data directory
    pub fn session_path(&self) -> PathBuf {
        self.session_file.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("gestalt-signal-monitor")
                .join("session.json")
        })
    }
}

fn default_private_key_env() -> String {
    "GESTALT_WALLET_KEY".to_string()
}
