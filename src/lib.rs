//! Emotion stability voting for webcam kiosks.
//!
//! A frame source reports, once per processed frame, whether a face was
//! found and what the classifier guessed. The [`voter`] decides when that
//! noisy stream has settled on one emotion; the [`detector`] runs it on a
//! dedicated thread and publishes the latest result.

pub mod config;
pub mod detector;
pub mod emotion;
pub mod session;
pub mod trace;
pub mod voter;

pub use emotion::Emotion;
pub use voter::{EmotionVoter, StabilizationResult, VoterConfig, VoterError, VoterState};
