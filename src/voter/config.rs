use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::VoterError;

/// How a stable label is confirmed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ConfirmationMode {
    /// Most frequent label must hold `confirmation_ratio` of the window
    RatioOfWindow,
    /// The same label must be observed without interruption for `required_duration`
    ContinuousDuration { required_duration: Duration },
}

impl Default for ConfirmationMode {
    fn default() -> Self {
        Self::RatioOfWindow
    }
}

/// Voter configuration, fixed for the lifetime of a voter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterConfig {
    /// Observations older than this (relative to the current step) are evicted
    pub window_duration: Duration,
    /// Minimum window size before a ratio vote is attempted
    pub min_observations: usize,
    /// Share of the window the top label needs, in (0, 1]
    pub confirmation_ratio: f64,
    pub mode: ConfirmationMode,
    /// Clear the window when a frame has no face (ignored after confirmation)
    pub reset_on_face_loss: bool,
}

impl Default for VoterConfig {
    fn default() -> Self {
        Self {
            window_duration: Duration::from_secs(7),
            min_observations: 30,
            confirmation_ratio: 0.7,
            mode: ConfirmationMode::RatioOfWindow,
            reset_on_face_loss: true,
        }
    }
}

impl VoterConfig {
    /// Ratio-of-window config
    pub fn ratio(window_duration: Duration, min_observations: usize, confirmation_ratio: f64) -> Self {
        Self {
            window_duration,
            min_observations,
            confirmation_ratio,
            ..Self::default()
        }
    }

    /// Continuous-duration config
    pub fn continuous(required_duration: Duration) -> Self {
        Self {
            mode: ConfirmationMode::ContinuousDuration { required_duration },
            ..Self::default()
        }
    }

    pub fn with_reset_on_face_loss(mut self, reset_on_face_loss: bool) -> Self {
        self.reset_on_face_loss = reset_on_face_loss;
        self
    }

    /// Reject out-of-range parameters. Values are never clamped.
    pub fn validate(&self) -> Result<(), VoterError> {
        if self.window_duration.is_zero() {
            return Err(VoterError::Configuration(
                "window_duration must be positive".to_string(),
            ));
        }
        if self.min_observations == 0 {
            return Err(VoterError::Configuration(
                "min_observations must be at least 1".to_string(),
            ));
        }
        // NaN fails both comparisons
        if !(self.confirmation_ratio > 0.0 && self.confirmation_ratio <= 1.0) {
            return Err(VoterError::Configuration(format!(
                "confirmation_ratio must be in (0, 1], got {}",
                self.confirmation_ratio
            )));
        }
        if let ConfirmationMode::ContinuousDuration { required_duration } = self.mode {
            if required_duration.is_zero() {
                return Err(VoterError::Configuration(
                    "required_duration must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}
