use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detector::DetectorConfig;
use crate::voter::{ConfirmationMode, VoterConfig, VoterError};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,
    pub mode: ModeSetting,

    // Ratio-of-window tuning
    pub window_secs: f64,
    pub min_observations: usize,
    pub confirmation_ratio: f64,

    // Continuous-duration tuning
    pub required_secs: f64,

    pub reset_on_face_loss: bool,
    pub fold_disgust_into_neutral: bool,
    pub status_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            mode: ModeSetting::Ratio,
            window_secs: 7.0,
            min_observations: 30,
            confirmation_ratio: 0.7,
            required_secs: 1.5,
            reset_on_face_loss: true,
            fold_disgust_into_neutral: false,
            status_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .context("Failed to read config file")?;
            serde_json::from_str(&content)
                .context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(path, content)
            .context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Failed to get home directory")?;
        Ok(home.join(".emotion-voter"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Build a validated voter configuration
    pub fn voter_config(&self) -> Result<VoterConfig, VoterError> {
        let mode = match self.mode {
            ModeSetting::Ratio => ConfirmationMode::RatioOfWindow,
            ModeSetting::Continuous => ConfirmationMode::ContinuousDuration {
                required_duration: secs_to_duration("required_secs", self.required_secs)?,
            },
        };

        let config = VoterConfig {
            window_duration: secs_to_duration("window_secs", self.window_secs)?,
            min_observations: self.min_observations,
            confirmation_ratio: self.confirmation_ratio,
            mode,
            reset_on_face_loss: self.reset_on_face_loss,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the detector configuration
    pub fn detector_config(&self) -> Result<DetectorConfig, VoterError> {
        let config = DetectorConfig {
            voter: self.voter_config()?,
            fold_disgust_into_neutral: self.fold_disgust_into_neutral,
            status_interval_ms: self.status_interval_ms,
        };
        config.validate()?;
        Ok(config)
    }
}

fn secs_to_duration(name: &str, secs: f64) -> Result<Duration, VoterError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| VoterError::Configuration(format!("{} must be a finite, non-negative number of seconds, got {}", name, secs)))
}

/// Confirmation mode selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    Ratio,
    Continuous,
}

impl Default for ModeSetting {
    fn default() -> Self {
        Self::Ratio
    }
}

impl ModeSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ratio => "ratio",
            Self::Continuous => "continuous",
        }
    }
}

impl std::str::FromStr for ModeSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ratio" | "window" => Ok(Self::Ratio),
            "continuous" | "duration" => Ok(Self::Continuous),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}
