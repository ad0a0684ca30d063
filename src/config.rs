//! Poller configuration.
//!
//! Layered: built-in defaults, then an optional config file (JSON, or YAML
//! for `.yaml`/`.yml`), then command-line overrides.

use anyhow::{bail, Context, Result};
use clap::Args;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poller::{DEFAULT_INTERVAL, DEFAULT_TIMEOUT};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_PATH: &str = "/interface/state";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollerConfig {
    /// Origin the endpoint path is resolved against.
    pub base_url: String,
    pub path: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            path: DEFAULT_PATH.to_string(),
            interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Command-line overrides; any flag left out keeps the file/default value.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Origin the endpoint path is resolved against
    #[arg(long)]
    pub base_url: Option<String>,

    /// Status endpoint path
    #[arg(long)]
    pub path: Option<String>,

    /// Delay between the start of two poll cycles, in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Per-request timeout, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl PollerConfig {
    /// `<config_dir>/traffic-light/config.json`, if the platform has a
    /// config directory.
    pub fn default_file() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("traffic-light").join("config.json"))
    }

    /// Load from `explicit` (must exist), else from the default file when
    /// present, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with_fallback(explicit, Self::default_file())
    }

    fn load_with_fallback(explicit: Option<&Path>, fallback: Option<PathBuf>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match fallback {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        if is_yaml {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {}", path.display()))
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))
        }
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(path) = overrides.path {
            self.path = path;
        }
        if let Some(interval_ms) = overrides.interval_ms {
            self.interval_ms = interval_ms;
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("baseUrl is not a valid URL: {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("baseUrl must use http or https, got {}", url.scheme());
        }
        if self.path.trim().is_empty() {
            bail!("path must not be empty");
        }
        if self.timeout_ms == 0 {
            bail!("timeoutMs must be greater than zero");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
