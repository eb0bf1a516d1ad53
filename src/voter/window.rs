//! Time-bounded voting window
//!
//! Holds the most recent observations in arrival order. Entries older than
//! the window duration are evicted before each vote; an entry exactly
//! `window_duration` old is kept.

use std::collections::VecDeque;
use std::time::Duration;

use crate::emotion::Emotion;

/// A single classified frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub at: Duration,
    pub label: Emotion,
}

/// Outcome of tallying the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tally {
    pub leader: Emotion,
    pub count: usize,
    pub total: usize,
}

impl Tally {
    pub fn share(&self) -> f64 {
        self.count as f64 / self.total as f64
    }
}

#[derive(Debug)]
pub struct VotingWindow {
    entries: VecDeque<Observation>,
    duration: Duration,
}

impl VotingWindow {
    pub fn new(duration: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            duration,
        }
    }

    pub fn push(&mut self, observation: Observation) {
        self.entries.push_back(observation);
    }

    /// Drop entries with `now - at > duration`. Returns how many were dropped.
    pub fn evict(&mut self, now: Duration) -> usize {
        let mut evicted = 0;
        while let Some(front) = self.entries.front() {
            if now.saturating_sub(front.at) > self.duration {
                self.entries.pop_front();
                evicted += 1;
            } else {
                break;
            }
        }
        evicted
    }

    /// Count labels and pick the leader. Ties go to the label that sorts first.
    pub fn tally(&self) -> Option<Tally> {
        if self.entries.is_empty() {
            return None;
        }

        let mut counts = [0usize; Emotion::ALL.len()];
        for obs in &self.entries {
            counts[obs.label.index()] += 1;
        }

        // Strict `>` keeps the earliest label in `ALL` on ties
        let mut leader = Emotion::ALL[0];
        let mut best = 0;
        for emotion in Emotion::ALL {
            let count = counts[emotion.index()];
            if count > best {
                leader = emotion;
                best = count;
            }
        }

        Some(Tally {
            leader,
            count: best,
            total: self.entries.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recently pushed observation
    pub fn latest(&self) -> Option<&Observation> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.entries.iter()
    }
}
