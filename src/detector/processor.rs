//! Detection frame loop
//!
//! The voter is owned by this thread alone. Frames and resets arrive over a
//! channel, the latest status is published through a watch slot, and
//! confirmations are reported to the consumer over an mpsc channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc as tokio_mpsc, watch};
use tracing::{debug, info, warn};

use super::status::DetectionStatus;
use crate::emotion::Emotion;
use crate::voter::{EmotionVoter, StabilizationResult, VoterConfig, VoterError, VoterStats};

/// Capacity of the consumer event channel
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Input to the frame loop
#[derive(Debug)]
pub enum DetectorInput {
    Frame {
        face_present: bool,
        label: Option<Emotion>,
        at: Duration,
    },
    Reset,
    Shutdown,
}

/// Message from the frame loop
#[derive(Debug)]
pub enum DetectorMessage {
    /// An episode was confirmed
    Confirmed {
        result: StabilizationResult,
        playback_bucket: Emotion,
    },
    /// A frame was rejected; the loop keeps running
    Rejected(VoterError),
    /// Periodic status update
    Status(DetectionStatus),
    /// Frame loop stopped
    Stopped(VoterStats),
}

/// Frame loop configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub voter: VoterConfig,
    pub fold_disgust_into_neutral: bool,
    pub status_interval_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            voter: VoterConfig::default(),
            fold_disgust_into_neutral: false,
            status_interval_ms: 1000,
        }
    }
}

impl DetectorConfig {
    /// Reject a config the frame loop cannot run with
    pub fn validate(&self) -> Result<(), VoterError> {
        if self.status_interval_ms == 0 {
            return Err(VoterError::Configuration(
                "status_interval_ms must be positive".to_string(),
            ));
        }
        self.voter.validate()
    }
}

/// Cloneable sender for frames and control requests.
///
/// Any thread may hold one; only the frame loop touches the voter.
#[derive(Debug, Clone)]
pub struct FrameSender {
    input_tx: Sender<DetectorInput>,
    stop_flag: Arc<AtomicBool>,
    epoch: Instant,
}

impl FrameSender {
    /// Send a live frame, stamped against the detector's monotonic epoch
    pub fn send_frame(&self, face_present: bool, label: Option<Emotion>) {
        self.send_frame_at(face_present, label, self.epoch.elapsed());
    }

    /// Send a frame with an explicit timestamp (replayed traces)
    pub fn send_frame_at(&self, face_present: bool, label: Option<Emotion>, at: Duration) {
        let input = DetectorInput::Frame {
            face_present,
            label,
            at,
        };
        if self.input_tx.send(input).is_err() {
            debug!("Frame at {:?} dropped, detector already stopped", at);
        }
    }

    /// Request a fresh episode
    pub fn reset(&self) {
        if self.input_tx.send(DetectorInput::Reset).is_err() {
            warn!("Reset dropped, detector already stopped");
        }
    }

    /// Stop after the frames already queued have been processed
    pub fn finish(&self) {
        if self.input_tx.send(DetectorInput::Shutdown).is_err() {
            debug!("Detector already stopped");
        }
    }

    /// Stop as soon as possible, dropping queued frames
    pub fn stop(&self) {
        info!("Requesting detector stop");
        self.stop_flag.store(true, Ordering::SeqCst);
        if self.input_tx.send(DetectorInput::Shutdown).is_err() {
            debug!("Detector already stopped");
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }
}

/// Handle to the detector thread
pub struct DetectorHandle {
    sender: FrameSender,
    status_rx: watch::Receiver<DetectionStatus>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl DetectorHandle {
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    pub fn send_frame(&self, face_present: bool, label: Option<Emotion>) {
        self.sender.send_frame(face_present, label);
    }

    pub fn send_frame_at(&self, face_present: bool, label: Option<Emotion>, at: Duration) {
        self.sender.send_frame_at(face_present, label, at);
    }

    pub fn reset(&self) {
        self.sender.reset();
    }

    pub fn finish(&self) {
        self.sender.finish();
    }

    pub fn stop(&self) {
        self.sender.stop();
    }

    /// Subscribe to the latest-status slot
    pub fn subscribe(&self) -> watch::Receiver<DetectionStatus> {
        self.status_rx.clone()
    }

    /// Current value of the latest-status slot
    pub fn status(&self) -> DetectionStatus {
        self.status_rx.borrow().clone()
    }

    /// Wait for the thread to finish
    pub fn join(mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Detector thread panicked");
            }
        }
    }
}

/// Start the detector thread.
///
/// The configuration is validated here, before anything is spawned.
pub fn start_detector(
    config: DetectorConfig,
) -> Result<(DetectorHandle, tokio_mpsc::Receiver<DetectorMessage>), VoterError> {
    config.validate()?;
    let voter = EmotionVoter::new(config.voter.clone())?;

    let (input_tx, input_rx) = mpsc::channel();
    let (event_tx, event_rx) = tokio_mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (status_tx, status_rx) = watch::channel(DetectionStatus::default());
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();

    let thread_handle = thread::spawn(move || {
        run_detector(voter, config, input_rx, event_tx, status_tx, stop_flag_clone);
    });

    let handle = DetectorHandle {
        sender: FrameSender {
            input_tx,
            stop_flag,
            epoch: Instant::now(),
        },
        status_rx,
        thread_handle: Some(thread_handle),
    };

    Ok((handle, event_rx))
}

fn run_detector(
    mut voter: EmotionVoter,
    config: DetectorConfig,
    input_rx: Receiver<DetectorInput>,
    tx: tokio_mpsc::Sender<DetectorMessage>,
    status_tx: watch::Sender<DetectionStatus>,
    stop_flag: Arc<AtomicBool>,
) {
    info!(
        "Detector started: mode={:?}, window={:?}, min_observations={}, ratio={}",
        config.voter.mode,
        config.voter.window_duration,
        config.voter.min_observations,
        config.voter.confirmation_ratio
    );

    let fold = config.fold_disgust_into_neutral;
    let status_interval = Duration::from_millis(config.status_interval_ms);
    let mut last_status_time = Instant::now();

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            info!("Stop flag received");
            break;
        }

        match input_rx.recv_timeout(status_interval) {
            Ok(DetectorInput::Frame {
                face_present,
                label,
                at,
            }) => match voter.step(face_present, label, at) {
                Ok(Some(result)) => {
                    publish(&status_tx, DetectionStatus::from_snapshot(&voter.snapshot(), fold));
                    let message = DetectorMessage::Confirmed {
                        result,
                        playback_bucket: result.label.playback_bucket(fold),
                    };
                    if tx.blocking_send(message).is_err() {
                        warn!("Failed to send confirmation, receiver dropped");
                    }
                }
                Ok(None) => {
                    publish(&status_tx, DetectionStatus::from_snapshot(&voter.snapshot(), fold));
                }
                Err(e) => {
                    warn!("Frame at {:?} rejected: {}", at, e);
                    let _ = tx.blocking_send(DetectorMessage::Rejected(e));
                }
            },
            Ok(DetectorInput::Reset) => {
                voter.reset();
                publish(&status_tx, DetectionStatus::from_snapshot(&voter.snapshot(), fold));
                debug!("Detection episode reset");
            }
            Ok(DetectorInput::Shutdown) => {
                info!("Shutdown requested");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("All frame senders dropped");
                break;
            }
        }

        // Send status updates periodically
        if last_status_time.elapsed() >= status_interval {
            let _ = tx.try_send(DetectorMessage::Status(status_tx.borrow().clone()));
            last_status_time = Instant::now();
        }
    }

    let stats = voter.stats();
    info!(
        "Detector stopped: {} frames, {} confirmations, {} rejected",
        stats.frames, stats.confirmations, stats.rejected_steps
    );
    let _ = tx.blocking_send(DetectorMessage::Stopped(stats));
}

/// Replace the slot value, waking watchers only when it changed
fn publish(status_tx: &watch::Sender<DetectionStatus>, status: DetectionStatus) {
    status_tx.send_if_modified(|current| {
        if *current != status {
            *current = status;
            true
        } else {
            false
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voter::VoterState;

    fn test_config() -> DetectorConfig {
        DetectorConfig {
            voter: VoterConfig::ratio(Duration::from_secs(4), 3, 0.6),
            fold_disgust_into_neutral: true,
            status_interval_ms: 50,
        }
    }

    /// Drain events until the loop reports it stopped
    fn drain(rx: &mut tokio_mpsc::Receiver<DetectorMessage>) -> (Vec<DetectorMessage>, VoterStats) {
        let mut events = Vec::new();
        while let Some(msg) = rx.blocking_recv() {
            match msg {
                DetectorMessage::Stopped(stats) => return (events, stats),
                DetectorMessage::Status(_) => {}
                other => events.push(other),
            }
        }
        panic!("detector exited without Stopped");
    }

    #[test]
    fn test_invalid_config_fails_before_spawn() {
        let mut config = test_config();
        config.voter.confirmation_ratio = 1.5;
        assert!(matches!(start_detector(config), Err(VoterError::Configuration(_))));
    }

    #[test]
    fn test_zero_status_interval_fails_before_spawn() {
        let config = DetectorConfig {
            status_interval_ms: 0,
            ..test_config()
        };
        assert!(matches!(
            config.validate(),
            Err(VoterError::Configuration(_))
        ));
        assert!(matches!(start_detector(config), Err(VoterError::Configuration(_))));
    }

    #[test]
    fn test_detector_confirms_and_publishes() {
        let (handle, mut rx) = start_detector(test_config()).unwrap();
        for i in 0..3 {
            handle.send_frame_at(true, Some(Emotion::Disgust), Duration::from_secs(i));
        }
        handle.finish();

        let (events, stats) = drain(&mut rx);
        assert_eq!(stats.confirmations, 1);
        match &events[..] {
            [DetectorMessage::Confirmed {
                result,
                playback_bucket,
            }] => {
                assert_eq!(result.label, Emotion::Disgust);
                assert_eq!(result.confirmed_at, Duration::from_secs(2));
                assert_eq!(*playback_bucket, Emotion::Neutral);
            }
            other => panic!("unexpected events: {:?}", other),
        }

        let status = handle.status();
        assert!(status.detected);
        assert_eq!(status.emotion, Some(Emotion::Disgust));
        assert_eq!(status.confirmed_at_ms, Some(2000));
        handle.join();
    }

    #[test]
    fn test_reset_from_another_thread() {
        let (handle, mut rx) = start_detector(test_config()).unwrap();
        let sender = handle.sender();

        for i in 0..3 {
            handle.send_frame_at(true, Some(Emotion::Happy), Duration::from_secs(i));
        }
        std::thread::spawn(move || sender.reset()).join().unwrap();
        for i in 3..6 {
            handle.send_frame_at(true, Some(Emotion::Sad), Duration::from_secs(i));
        }
        handle.finish();

        let (events, stats) = drain(&mut rx);
        let labels: Vec<Emotion> = events
            .iter()
            .filter_map(|e| match e {
                DetectorMessage::Confirmed { result, .. } => Some(result.label),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec![Emotion::Happy, Emotion::Sad]);
        assert_eq!(stats.resets, 1);
        assert_eq!(handle.status().emotion, Some(Emotion::Sad));
        handle.join();
    }

    #[test]
    fn test_rejected_frame_is_absorbed() {
        let (handle, mut rx) = start_detector(test_config()).unwrap();
        handle.send_frame_at(true, Some(Emotion::Fear), Duration::from_secs(5));
        handle.send_frame_at(true, Some(Emotion::Fear), Duration::from_secs(1));
        handle.send_frame_at(true, None, Duration::from_secs(6));
        handle.finish();

        let (events, stats) = drain(&mut rx);
        assert_eq!(stats.rejected_steps, 2);
        assert!(matches!(
            events[0],
            DetectorMessage::Rejected(VoterError::Timing { .. })
        ));
        assert!(matches!(
            events[1],
            DetectorMessage::Rejected(VoterError::InvalidObservation(_))
        ));

        let status = handle.status();
        assert_eq!(status.state, VoterState::Accumulating);
        assert_eq!(status.window_len, 1);
        handle.join();
    }

    #[test]
    fn test_sending_after_join_is_harmless() {
        let (handle, mut rx) = start_detector(test_config()).unwrap();
        let sender = handle.sender();
        handle.finish();
        let (_, stats) = drain(&mut rx);
        handle.join();

        sender.send_frame_at(true, Some(Emotion::Happy), Duration::from_secs(1));
        sender.send_frame(false, None);
        sender.reset();
        sender.finish();
        sender.stop();
        assert_eq!(stats.frames, 0);
        assert!(sender.is_stopping());
    }

    #[test]
    fn test_join_survives_panicked_thread() {
        let (input_tx, _input_rx) = mpsc::channel();
        let (_status_tx, status_rx) = watch::channel(DetectionStatus::default());
        let handle = DetectorHandle {
            sender: FrameSender {
                input_tx,
                stop_flag: Arc::new(AtomicBool::new(false)),
                epoch: Instant::now(),
            },
            status_rx,
            thread_handle: Some(thread::spawn(|| panic!("frame loop failed"))),
        };
        handle.join();
    }

    #[test]
    fn test_live_label_follows_frames() {
        let (handle, mut rx) = start_detector(test_config()).unwrap();
        handle.send_frame_at(true, Some(Emotion::Happy), Duration::from_secs(0));
        handle.send_frame_at(true, Some(Emotion::Sad), Duration::from_secs(1));
        handle.finish();
        drain(&mut rx);

        let status = handle.status();
        assert!(!status.detected);
        assert_eq!(status.last_label, Some(Emotion::Sad));
        handle.join();
    }

    #[test]
    fn test_stop_reports_stopped() {
        let (handle, mut rx) = start_detector(test_config()).unwrap();
        handle.stop();
        let (events, stats) = drain(&mut rx);
        assert!(events.is_empty());
        assert_eq!(stats.frames, 0);
        assert!(handle.sender().is_stopping());
        handle.join();
    }

    #[tokio::test]
    async fn test_watch_slot_notifies_on_confirmation() {
        let (handle, mut rx) = start_detector(test_config()).unwrap();
        let mut status_rx = handle.subscribe();

        for i in 0..3 {
            handle.send_frame_at(true, Some(Emotion::Angry), Duration::from_secs(i));
        }

        loop {
            status_rx.changed().await.unwrap();
            if status_rx.borrow().detected {
                break;
            }
        }
        assert_eq!(status_rx.borrow().emotion, Some(Emotion::Angry));

        handle.finish();
        while let Some(msg) = rx.recv().await {
            if matches!(msg, DetectorMessage::Stopped(_)) {
                break;
            }
        }
        handle.join();
    }
}
