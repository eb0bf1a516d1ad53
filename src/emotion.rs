use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::voter::VoterError;

/// Emotion labels produced by the per-frame classifier.
///
/// Variants are declared in lexicographic order of their names, so the
/// derived `Ord` is the tie-break order used when two labels share the
/// top count in a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    /// Every label, in tie-break order
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Angry => "angry",
            Self::Disgust => "disgust",
            Self::Fear => "fear",
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Sad => "sad",
            Self::Surprise => "surprise",
        }
    }

    /// Position in `ALL`, used for fixed-size tallies
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    /// Media bucket a confirmed label plays from.
    ///
    /// Some kiosk builds ship no disgust clips and fall back to neutral.
    pub fn playback_bucket(&self, fold_disgust_into_neutral: bool) -> Emotion {
        match self {
            Self::Disgust if fold_disgust_into_neutral => Self::Neutral,
            other => *other,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = VoterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "angry" => Ok(Self::Angry),
            "disgust" => Ok(Self::Disgust),
            "fear" => Ok(Self::Fear),
            "happy" => Ok(Self::Happy),
            "neutral" => Ok(Self::Neutral),
            "sad" => Ok(Self::Sad),
            "surprise" => Ok(Self::Surprise),
            _ => Err(VoterError::InvalidObservation(format!(
                "unknown emotion label: {:?}",
                s
            ))),
        }
    }
}
