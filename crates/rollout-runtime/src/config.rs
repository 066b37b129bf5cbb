//! Runtime configuration: defaults → TOML file → environment → CLI flags.

use std::path::{Path, PathBuf};

use rollout_core::schedule::PollCadence;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_BASE_URL: &str = "ROLLOUT_BASE_URL";
pub const ENV_TOKEN: &str = "ROLLOUT_TOKEN";
pub const ENV_POLL_INPROGRESS_MS: &str = "ROLLOUT_POLL_INPROGRESS_MS";
pub const ENV_POLL_IDLE_MS: &str = "ROLLOUT_POLL_IDLE_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value:?} (expected milliseconds)")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// API root, e.g. `https://ci.example.com/orchestrator`.
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout_secs: u64,
    pub poll: PollCadence,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/orchestrator".to_string(),
            token: None,
            request_timeout_secs: 30,
            poll: PollCadence::default(),
        }
    }
}

/// Values given on the command line. `None` keeps the lower layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub poll_in_progress_ms: Option<u64>,
    pub poll_idle_ms: Option<u64>,
}

/// `$XDG_CONFIG_HOME/rollout/config.toml`, else `~/.config/rollout/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME")
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir).join("rollout/config.toml"));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config/rollout/config.toml"))
}

impl RuntimeConfig {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load all layers. An explicit `--config` file must exist; the default
    /// location is optional.
    pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.apply_overrides(overrides);
        tracing::debug!(base_url = %config.base_url, poll = ?config.poll, "configuration loaded");
        Ok(config)
    }

    /// Apply `ROLLOUT_*` variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            self.token = Some(token);
        }
        if let Some(ms) = parse_ms(&lookup, ENV_POLL_INPROGRESS_MS)? {
            self.poll.in_progress_ms = ms;
        }
        if let Some(ms) = parse_ms(&lookup, ENV_POLL_IDLE_MS)? {
            self.poll.idle_ms = ms;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, o: &Overrides) {
        if let Some(url) = &o.base_url {
            self.base_url.clone_from(url);
        }
        if let Some(token) = &o.token {
            self.token = Some(token.clone());
        }
        if let Some(ms) = o.poll_in_progress_ms {
            self.poll.in_progress_ms = ms;
        }
        if let Some(ms) = o.poll_idle_ms {
            self.poll.idle_ms = ms;
        }
    }
}

fn parse_ms<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => Ok(Some(ms)),
            _ => Err(ConfigError::InvalidEnv { var, value: raw }),
        },
    }
}
