//! Frame trace files
//!
//! One JSON object per line, `t` in seconds since the start of the trace:
//!
//! ```text
//! {"t": 0.0, "face": true, "label": "happy"}
//! {"t": 0.1, "face": false}
//! {"t": 5.0, "reset": true}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use std::time::Duration;

use crate::emotion::Emotion;
use crate::voter::VoterError;

/// A raw trace line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub t: f64,
    #[serde(default)]
    pub face: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub reset: bool,
}

/// A parsed trace event, ready to replay
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Frame {
        at: Duration,
        face_present: bool,
        label: Option<Emotion>,
    },
    Reset {
        at: Duration,
    },
    /// A frame whose label is not a known emotion. Skipped during replay.
    Invalid {
        line: usize,
        at: Duration,
        error: VoterError,
    },
}

impl TraceEvent {
    pub fn at(&self) -> Duration {
        match self {
            TraceEvent::Frame { at, .. } | TraceEvent::Reset { at } | TraceEvent::Invalid { at, .. } => *at,
        }
    }
}

/// Load a trace file
pub fn load_trace(path: &Path) -> Result<Vec<TraceEvent>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open trace file {:?}", path))?;
    parse_trace(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse trace file {:?}", path))
}

/// Parse trace lines from any reader
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceEvent>> {
    let mut events = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: TraceRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("Malformed record on line {}", line_no))?;
        events.push(to_event(record, line_no)?);
    }

    Ok(events)
}

fn to_event(record: TraceRecord, line_no: usize) -> Result<TraceEvent> {
    if !record.t.is_finite() || record.t < 0.0 {
        bail!("Invalid timestamp {} on line {}", record.t, line_no);
    }
    // Microsecond resolution, so 0.3 lands on 300ms rather than 299.999999ms
    let at = Duration::from_micros((record.t * 1_000_000.0).round() as u64);

    if record.reset {
        return Ok(TraceEvent::Reset { at });
    }

    let label = match record.label.as_deref().map(str::parse::<Emotion>) {
        None => None,
        Some(Ok(label)) => Some(label),
        Some(Err(error)) => {
            return Ok(TraceEvent::Invalid {
                line: line_no,
                at,
                error,
            })
        }
    };

    Ok(TraceEvent::Frame {
        at,
        face_present: record.face,
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;

    #[test]
    fn test_parse_frames_and_resets() {
        let input = r#"
# warm-up
{"t": 0.0, "face": true, "label": "happy"}
{"t": 0.5, "face": false}

{"t": 1.25, "reset": true}
"#;
        let events = parse_trace(Cursor::new(input)).unwrap();
        assert_eq!(
            events,
            vec![
                TraceEvent::Frame {
                    at: Duration::ZERO,
                    face_present: true,
                    label: Some(Emotion::Happy),
                },
                TraceEvent::Frame {
                    at: Duration::from_millis(500),
                    face_present: false,
                    label: None,
                },
                TraceEvent::Reset {
                    at: Duration::from_millis(1250)
                },
            ]
        );
    }

    #[test]
    fn test_unknown_label_kept_as_invalid() {
        let input = "{\"t\": 2.0, \"face\": true, \"label\": \"bored\"}\n";
        let events = parse_trace(Cursor::new(input)).unwrap();
        match &events[0] {
            TraceEvent::Invalid { line, at, error } => {
                assert_eq!(*line, 1);
                assert_eq!(*at, Duration::from_secs(2));
                assert!(matches!(error, VoterError::InvalidObservation(_)));
            }
            other => panic!("expected invalid event, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let input = "{\"t\": 0.0, \"face\": true, \"label\": \"sad\"}\nnot json\n";
        let err = parse_trace(Cursor::new(input)).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let input = "{\"t\": -1.0, \"face\": false}\n";
        assert!(parse_trace(Cursor::new(input)).is_err());
    }

    #[test]
    fn test_load_trace_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"t\": 0.1, \"face\": true, \"label\": \"fear\"}}").unwrap();
        writeln!(file, "{{\"t\": 0.2, \"face\": true, \"label\": \"fear\"}}").unwrap();

        let events = load_trace(file.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].at(), Duration::from_millis(200));
    }

    #[test]
    fn test_replay_demo_session() {
        use crate::voter::{EmotionVoter, VoterConfig};

        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/kiosk_session.jsonl");
        let events = load_trace(&path).unwrap();
        let mut voter = EmotionVoter::new(VoterConfig::default()).unwrap();

        let mut confirmed = Vec::new();
        for event in events {
            match event {
                TraceEvent::Frame {
                    at,
                    face_present,
                    label,
                } => {
                    if let Some(result) = voter.step(face_present, label, at).unwrap() {
                        confirmed.push((result.label, result.confirmed_at));
                    }
                }
                TraceEvent::Reset { .. } => voter.reset(),
                TraceEvent::Invalid { .. } => panic!("demo trace has invalid lines"),
            }
        }

        assert_eq!(
            confirmed,
            vec![
                (Emotion::Happy, Duration::from_millis(2900)),
                (Emotion::Sad, Duration::from_millis(7500)),
            ]
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_trace(&dir.path().join("missing.jsonl")).is_err());
    }
}
