use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, trace};

use super::candidate::CandidateTracker;
use super::config::{ConfirmationMode, VoterConfig};
use super::window::{Observation, VotingWindow};
use super::VoterError;
use crate::emotion::Emotion;

/// Episode state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoterState {
    Empty,
    Accumulating,
    Confirmed,
}

impl VoterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoterState::Empty => "empty",
            VoterState::Accumulating => "accumulating",
            VoterState::Confirmed => "confirmed",
        }
    }
}

/// The confirmed label of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilizationResult {
    pub label: Emotion,
    pub confirmed_at: Duration,
}

/// Counters for everything the voter absorbed.
///
/// `skipped_below_min` growing while `confirmations` stays flat means the
/// window never fills (sampling too slow for the window duration).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterStats {
    pub frames: u64,
    pub observations: u64,
    pub face_losses: u64,
    pub evicted: u64,
    pub skipped_below_min: u64,
    pub sub_threshold_votes: u64,
    pub rejected_steps: u64,
    pub confirmations: u64,
    pub resets: u64,
}

/// Read-only view handed to other threads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterSnapshot {
    pub state: VoterState,
    pub result: Option<StabilizationResult>,
    pub window_len: usize,
    pub candidate: Option<Emotion>,
    /// Label of the newest observation still in the window
    pub last_label: Option<Emotion>,
}

/// Emotion stability voter.
///
/// One `step` per processed frame. Owned by a single frame loop; other
/// threads read `snapshot()` values that the owner publishes.
#[derive(Debug)]
pub struct EmotionVoter {
    config: VoterConfig,
    window: VotingWindow,
    candidate: CandidateTracker,
    result: Option<StabilizationResult>,
    last_step: Option<Duration>,
    stats: VoterStats,
}

impl EmotionVoter {
    pub fn new(config: VoterConfig) -> Result<Self, VoterError> {
        config.validate()?;

        let required = match config.mode {
            ConfirmationMode::ContinuousDuration { required_duration } => required_duration,
            ConfirmationMode::RatioOfWindow => Duration::ZERO,
        };

        Ok(Self {
            window: VotingWindow::new(config.window_duration),
            candidate: CandidateTracker::new(required),
            config,
            result: None,
            last_step: None,
            stats: VoterStats::default(),
        })
    }

    /// Process one frame.
    ///
    /// Returns the result on the step that confirms, `None` otherwise.
    /// A rejected step leaves the window, candidate and result untouched.
    pub fn step(
        &mut self,
        face_present: bool,
        label: Option<Emotion>,
        now: Duration,
    ) -> Result<Option<StabilizationResult>, VoterError> {
        if let Err(e) = self.check_input(face_present, label, now) {
            self.stats.rejected_steps += 1;
            return Err(e);
        }
        self.last_step = Some(now);
        self.stats.frames += 1;

        if self.result.is_some() {
            trace!("Episode already confirmed, ignoring frame at {:?}", now);
            return Ok(None);
        }

        let label = match (face_present, label) {
            (true, Some(label)) => label,
            _ => {
                self.on_face_lost(now);
                return Ok(None);
            }
        };

        self.stats.observations += 1;
        self.window.push(Observation { at: now, label });
        self.stats.evicted += self.window.evict(now) as u64;

        let confirmed = match self.config.mode {
            ConfirmationMode::RatioOfWindow => self.vote_ratio(now),
            ConfirmationMode::ContinuousDuration { .. } => self.candidate.observe(label, now),
        };

        Ok(confirmed.map(|label| self.confirm(label, now)))
    }

    /// Start a fresh episode. Safe to call at any time, any number of times.
    ///
    /// The timestamp of the last accepted step is kept, so the clock must
    /// keep moving forward across resets.
    pub fn reset(&mut self) {
        if self.state() != VoterState::Empty {
            debug!("Voter reset from {}", self.state().as_str());
        }
        self.window.clear();
        self.candidate.clear();
        self.result = None;
        self.stats.resets += 1;
    }

    pub fn state(&self) -> VoterState {
        if self.result.is_some() {
            VoterState::Confirmed
        } else if self.window.is_empty() && self.candidate.current().is_none() {
            VoterState::Empty
        } else {
            VoterState::Accumulating
        }
    }

    pub fn result(&self) -> Option<StabilizationResult> {
        self.result
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn candidate(&self) -> Option<Emotion> {
        self.candidate.current().map(|c| c.label)
    }

    pub fn config(&self) -> &VoterConfig {
        &self.config
    }

    pub fn stats(&self) -> VoterStats {
        self.stats
    }

    pub fn snapshot(&self) -> VoterSnapshot {
        VoterSnapshot {
            state: self.state(),
            result: self.result,
            window_len: self.window.len(),
            candidate: self.candidate(),
            last_label: self.window.latest().map(|obs| obs.label),
        }
    }

    fn check_input(
        &self,
        face_present: bool,
        label: Option<Emotion>,
        now: Duration,
    ) -> Result<(), VoterError> {
        match (face_present, label) {
            (true, None) => {
                return Err(VoterError::InvalidObservation(
                    "face present but no label supplied".to_string(),
                ))
            }
            (false, Some(label)) => {
                return Err(VoterError::InvalidObservation(format!(
                    "label {} supplied without a face",
                    label
                )))
            }
            _ => {}
        }

        if let Some(previous) = self.last_step {
            if now < previous {
                return Err(VoterError::Timing { previous, now });
            }
        }
        Ok(())
    }

    fn on_face_lost(&mut self, now: Duration) {
        self.stats.face_losses += 1;
        if !self.config.reset_on_face_loss {
            trace!("Face lost at {:?}, keeping window", now);
            return;
        }
        if !self.window.is_empty() {
            debug!(
                "Face lost at {:?}, discarding {} observations",
                now,
                self.window.len()
            );
        }
        self.window.clear();
        self.candidate.clear();
    }

    fn vote_ratio(&mut self, now: Duration) -> Option<Emotion> {
        if self.window.len() < self.config.min_observations {
            self.stats.skipped_below_min += 1;
            trace!(
                "Window below minimum at {:?}: {} < {}",
                now,
                self.window.len(),
                self.config.min_observations
            );
            return None;
        }

        let tally = self.window.tally()?;
        debug!(
            "Vote at {:?}: window={}, leader={}, share={:.2}",
            now,
            tally.total,
            tally.leader,
            tally.share()
        );

        if tally.share() >= self.config.confirmation_ratio {
            Some(tally.leader)
        } else {
            self.stats.sub_threshold_votes += 1;
            None
        }
    }

    fn confirm(&mut self, label: Emotion, now: Duration) -> StabilizationResult {
        let result = StabilizationResult {
            label,
            confirmed_at: now,
        };
        info!("Emotion stabilized: {} at {:?}", label, now);
        self.result = Some(result);
        self.stats.confirmations += 1;
        result
    }
}
