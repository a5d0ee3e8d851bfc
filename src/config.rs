use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::MY_BETS_PATH;
use crate::currency::{Currency, DEFAULT_USD_RATE};
use crate::freshness::{REFRESH_BETS, RefreshPolicy, UPDATE_WALLET};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable overriding `[api] base_url`.
pub const API_URL_ENV: &str = "TOSSBOOK_API_URL";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Toss service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the `/api` prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Path listing the caller's bets (`/bets/my` or `/bets/me`).
    #[serde(default = "default_my_bets_path")]
    pub my_bets_path: String,
}

fn default_base_url() -> String {
    crate::DEFAULT_API_URL.to_string()
}

fn default_timeout() -> u64 {
    15
}

fn default_my_bets_path() -> String {
    MY_BETS_PATH.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            my_bets_path: default_my_bets_path(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the credential survives between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from(".tossbook/session.json")
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

/// Per-view refresh policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_wallet")]
    pub wallet: RefreshPolicy,
    #[serde(default = "default_matches")]
    pub matches: RefreshPolicy,
    #[serde(default = "default_bets")]
    pub bets: RefreshPolicy,
    #[serde(default = "default_history")]
    pub history: RefreshPolicy,
    #[serde(default = "default_transactions")]
    pub transactions: RefreshPolicy,
}

fn wallet_topics(period: Duration) -> RefreshPolicy {
    RefreshPolicy::every(period)
        .on(UPDATE_WALLET)
        .on(REFRESH_BETS)
}

fn default_wallet() -> RefreshPolicy {
    wallet_topics(Duration::from_secs(15))
}

fn default_matches() -> RefreshPolicy {
    RefreshPolicy::every(Duration::from_secs(15)).on(REFRESH_BETS)
}

fn default_bets() -> RefreshPolicy {
    wallet_topics(Duration::from_secs(15))
}

fn default_history() -> RefreshPolicy {
    wallet_topics(Duration::from_secs(20))
}

fn default_transactions() -> RefreshPolicy {
    wallet_topics(Duration::from_secs(15))
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            wallet: default_wallet(),
            matches: default_matches(),
            bets: default_bets(),
            history: default_history(),
            transactions: default_transactions(),
        }
    }
}

impl RefreshConfig {
    fn policies(&self) -> [(&'static str, &RefreshPolicy); 5] {
        [
            ("wallet", &self.wallet),
            ("matches", &self.matches),
            ("bets", &self.bets),
            ("history", &self.history),
            ("transactions", &self.transactions),
        ]
    }
}

/// Presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub currency: Currency,
    /// INR per USD.
    #[serde(default = "default_usd_rate")]
    pub usd_rate: Decimal,
}

fn default_usd_rate() -> Decimal {
    DEFAULT_USD_RATE
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            usd_rate: default_usd_rate(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::metadata(path) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            _ => Self::load(path),
        }
    }

    /// Apply overrides from the process environment (including `.env`).
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.api.base_url = url.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be positive");
        }
        if !self.api.my_bets_path.starts_with('/') {
            anyhow::bail!("api.my_bets_path must start with '/'");
        }
        for (name, policy) in self.refresh.policies() {
            if policy.period_ms == 0 {
                anyhow::bail!("refresh.{name}.period_ms must be positive");
            }
        }
        if self.display.usd_rate <= Decimal::ZERO {
            anyhow::bail!("display.usd_rate must be positive");
        }
        Ok(())
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
