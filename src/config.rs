//! Tracker configuration loaded from `jobtrack.toml`.
//!
//! Missing keys fall back to defaults. `ANTHROPIC_API_KEY` takes precedence
//! over the file for the credential. Activity timeouts and retry policies are
//! fixed in [`crate::activities`] and not configurable here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::TrackerError;

pub const CONFIG_FILE: &str = "jobtrack.toml";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Credential for content generation. Empty means generation fails permanently.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Directory holding one history file per instance.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Concurrent activity executions shared by all instances.
    #[serde(default = "default_activity_workers")]
    pub activity_workers: usize,

    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_max_tokens() -> u32 {
    800
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".jobtrack")
}

fn default_activity_workers() -> usize {
    10
}

fn default_grace_period_days() -> u64 {
    7
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            store_dir: default_store_dir(),
            activity_workers: default_activity_workers(),
            grace_period_days: default_grace_period_days(),
        }
    }
}

impl TrackerConfig {
    /// Loads `path`, or defaults if it does not exist. The environment
    /// credential wins over the file.
    pub fn load_from(path: &Path) -> Result<Self, TrackerError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<TrackerConfig>(&contents)?
        } else {
            Self::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                config.api_key = key;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), TrackerError> {
        if self.activity_workers == 0 {
            return Err(TrackerError::Config(
                "activity_workers must be at least 1".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(TrackerError::Config("max_tokens must be at least 1".into()));
        }
        if self.grace_period_days.checked_mul(SECONDS_PER_DAY).is_none() {
            return Err(TrackerError::Config(format!(
                "grace_period_days {} is too large",
                self.grace_period_days
            )));
        }
        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_days.saturating_mul(SECONDS_PER_DAY))
    }
}
