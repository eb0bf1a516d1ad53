//! Emotion stability voting.
//!
//! Turns a noisy stream of per-frame emotion labels into a single confirmed
//! label per detection episode, either by majority share of a time-bounded
//! window or by how long one label has been held without interruption.

mod candidate;
mod config;
mod error;
mod stabilizer;
mod window;

pub use candidate::{Candidate, CandidateTracker};
pub use config::{ConfirmationMode, VoterConfig};
pub use error::VoterError;
pub use stabilizer::{EmotionVoter, StabilizationResult, VoterSnapshot, VoterState, VoterStats};
pub use window::{Observation, Tally, VotingWindow};
