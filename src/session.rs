use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::emotion::Emotion;
use crate::voter::{StabilizationResult, VoterStats};

/// One confirmed episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationEntry {
    pub episode: usize,
    pub label: Emotion,
    pub playback_bucket: Emotion,
    pub confirmed_at_ms: u64,
}

/// A complete detection run record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub run_id: Uuid,
    pub source: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub confirmations: Vec<ConfirmationEntry>,

    // Stats
    pub trace_events: usize,
    pub skipped_events: usize,
    pub rejected_frames: usize,
    pub voter_stats: Option<VoterStats>,
}

impl DetectionRecord {
    pub fn new(source: String, mode: String) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source,
            mode,
            started_at: Utc::now(),
            ended_at: None,
            confirmations: Vec::new(),
            trace_events: 0,
            skipped_events: 0,
            rejected_frames: 0,
            voter_stats: None,
        }
    }

    pub fn add_confirmation(&mut self, result: &StabilizationResult, playback_bucket: Emotion) {
        self.confirmations.push(ConfirmationEntry {
            episode: self.confirmations.len() + 1,
            label: result.label,
            playback_bucket,
            confirmed_at_ms: result.confirmed_at.as_millis() as u64,
        });
    }

    pub fn add_rejection(&mut self) {
        self.rejected_frames += 1;
    }

    pub fn finalize(&mut self, stats: VoterStats) {
        self.ended_at = Some(Utc::now());
        self.voter_stats = Some(stats);
    }

    /// Confirmed labels, one line per episode
    pub fn confirmation_lines(&self) -> Vec<String> {
        self.confirmations
            .iter()
            .map(|c| {
                format!(
                    "#{} {} at {} (plays {})",
                    c.episode,
                    c.label,
                    format_ms(c.confirmed_at_ms),
                    c.playback_bucket
                )
            })
            .collect()
    }
}

/// `mm:ss.mmm`
pub fn format_ms(ms: u64) -> String {
    format!("{:02}:{:02}.{:03}", ms / 60000, (ms % 60000) / 1000, ms % 1000)
}
