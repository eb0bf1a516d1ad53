use std::time::Duration;

use crate::emotion::Emotion;

/// Label currently awaiting continuous-duration confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub label: Emotion,
    pub since: Duration,
}

/// Tracks how long the same label has been seen without interruption.
///
/// Same shape as a debounce FSM: a different label restarts the clock,
/// the same label held for `required` confirms.
#[derive(Debug)]
pub struct CandidateTracker {
    current: Option<Candidate>,
    required: Duration,
}

impl CandidateTracker {
    pub fn new(required: Duration) -> Self {
        Self {
            current: None,
            required,
        }
    }

    /// Feed one label. Returns the label once it has held for `required`.
    pub fn observe(&mut self, label: Emotion, now: Duration) -> Option<Emotion> {
        match self.current {
            Some(candidate) if candidate.label == label => {
                if now.saturating_sub(candidate.since) >= self.required {
                    return Some(label);
                }
                None
            }
            _ => {
                self.current = Some(Candidate { label, since: now });
                None
            }
        }
    }

    pub fn current(&self) -> Option<Candidate> {
        self.current
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_first_label_starts_candidate() {
        let mut tracker = CandidateTracker::new(ms(1500));
        assert_eq!(tracker.observe(Emotion::Neutral, ms(0)), None);
        assert_eq!(
            tracker.current(),
            Some(Candidate {
                label: Emotion::Neutral,
                since: ms(0)
            })
        );
    }

    #[test]
    fn test_held_label_confirms_at_required() {
        let mut tracker = CandidateTracker::new(ms(1500));
        assert_eq!(tracker.observe(Emotion::Happy, ms(100)), None);
        assert_eq!(tracker.observe(Emotion::Happy, ms(1599)), None);
        assert_eq!(tracker.observe(Emotion::Happy, ms(1600)), Some(Emotion::Happy));
    }

    #[test]
    fn test_blip_restarts_clock() {
        let mut tracker = CandidateTracker::new(ms(1000));
        tracker.observe(Emotion::Sad, ms(0));
        tracker.observe(Emotion::Sad, ms(900));
        // Blip
        tracker.observe(Emotion::Fear, ms(950));
        assert_eq!(tracker.observe(Emotion::Sad, ms(1000)), None);
        assert_eq!(tracker.current().unwrap().since, ms(1000));
        assert_eq!(tracker.observe(Emotion::Sad, ms(2000)), Some(Emotion::Sad));
    }

    #[test]
    fn test_clear() {
        let mut tracker = CandidateTracker::new(ms(1000));
        tracker.observe(Emotion::Sad, ms(0));
        tracker.clear();
        assert!(tracker.current().is_none());
    }
}
