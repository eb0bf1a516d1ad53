use serde::{Deserialize, Serialize};

use crate::emotion::Emotion;
use crate::voter::{VoterSnapshot, VoterState};

/// Latest detection status, published by the frame loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionStatus {
    pub detected: bool,
    pub emotion: Option<Emotion>,
    pub playback_bucket: Option<Emotion>,
    pub confirmed_at_ms: Option<u64>,
    pub state: VoterState,
    pub window_len: usize,
    pub candidate: Option<Emotion>,
    /// Latest per-frame label while accumulating
    pub last_label: Option<Emotion>,
}

impl DetectionStatus {
    pub fn from_snapshot(snapshot: &VoterSnapshot, fold_disgust_into_neutral: bool) -> Self {
        let emotion = snapshot.result.map(|r| r.label);
        Self {
            detected: snapshot.result.is_some(),
            emotion,
            playback_bucket: emotion.map(|e| e.playback_bucket(fold_disgust_into_neutral)),
            confirmed_at_ms: snapshot
                .result
                .map(|r| r.confirmed_at.as_millis() as u64),
            state: snapshot.state,
            window_len: snapshot.window_len,
            candidate: snapshot.candidate,
            last_label: snapshot.last_label,
        }
    }
}

impl Default for DetectionStatus {
    fn default() -> Self {
        Self {
            detected: false,
            emotion: None,
            playback_bucket: None,
            confirmed_at_ms: None,
            state: VoterState::Empty,
            window_len: 0,
            candidate: None,
            last_label: None,
        }
    }
}
