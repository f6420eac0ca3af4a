//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{BvError, Result};

/// Number of finite latency bands shown in the legend.
pub const LATENCY_BANDS: usize = 5;

/// Full blockview configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub legend: LegendConfig,
    pub session: SessionConfig,
}

/// Render-loop cadence and queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderConfig {
    /// Sleep between render ticks. 40 ms gives 25 updates per second.
    pub refresh_interval_ms: u64,
    /// Report ring slots. Producer overwrites unread entries past this bound.
    pub ring_capacity: usize,
    /// Speed/ETA are recomputed on every Nth report.
    pub eta_update_every: u64,
    /// Bounded capacity of the log-strip channel.
    pub log_channel_capacity: usize,
}

/// Latency band thresholds in microseconds, strictly ascending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LegendConfig {
    pub latency_thresholds_us: [u64; LATENCY_BANDS],
}

/// End-of-session behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Ring the terminal bell when the scan ends.
    pub bell: bool,
    /// Block on a key press before tearing the dashboard down.
    pub wait_for_key: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 40,
            ring_capacity: 100_000,
            eta_update_every: 10,
            log_channel_capacity: 256,
        }
    }
}

impl Default for LegendConfig {
    fn default() -> Self {
        Self {
            latency_thresholds_us: [3_000, 10_000, 50_000, 150_000, 500_000],
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bell: true,
            wait_for_key: true,
        }
    }
}

impl RenderConfig {
    /// Render tick period.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[BV-CONFIG] WARNING: HOME not set, falling back to /tmp for config path");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        home_dir.join(".config").join("blockview").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| BvError::Io {
                path: path_buf.clone(),
                source,
            })?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(BvError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        set_env_u64(
            "BV_REFRESH_INTERVAL_MS",
            &mut self.render.refresh_interval_ms,
        )?;
        set_env_usize("BV_RING_CAPACITY", &mut self.render.ring_capacity)?;
        set_env_u64("BV_ETA_UPDATE_EVERY", &mut self.render.eta_update_every)?;
        set_env_bool("BV_BELL", &mut self.session.bell)?;
        set_env_bool("BV_WAIT_FOR_KEY", &mut self.session.wait_for_key)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=1_000).contains(&self.render.refresh_interval_ms) {
            return Err(BvError::InvalidConfig {
                details: format!(
                    "render.refresh_interval_ms must be in [1, 1000], got {}",
                    self.render.refresh_interval_ms
                ),
            });
        }
        if self.render.ring_capacity == 0 {
            return Err(BvError::InvalidConfig {
                details: "render.ring_capacity must be > 0".to_string(),
            });
        }
        if self.render.eta_update_every == 0 {
            return Err(BvError::InvalidConfig {
                details: "render.eta_update_every must be > 0".to_string(),
            });
        }
        if self.render.log_channel_capacity == 0 {
            return Err(BvError::InvalidConfig {
                details: "render.log_channel_capacity must be > 0".to_string(),
            });
        }

        let thresholds = &self.legend.latency_thresholds_us;
        if thresholds[0] == 0 {
            return Err(BvError::InvalidConfig {
                details: "legend.latency_thresholds_us must be non-zero".to_string(),
            });
        }
        if !thresholds.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(BvError::InvalidConfig {
                details: format!(
                    "legend.latency_thresholds_us must strictly ascend, got {thresholds:?}"
                ),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u64>().map_err(|error| BvError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_usize(name: &str, slot: &mut usize) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw
            .parse::<usize>()
            .map_err(|error| BvError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn set_env_bool(name: &str, slot: &mut bool) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<bool>().map_err(|error| BvError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}
