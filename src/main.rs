use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use emotion_voter::config::{Config, ModeSetting};
use emotion_voter::detector::{start_detector, DetectorMessage, FrameSender};
use emotion_voter::session::{format_ms, DetectionRecord};
use emotion_voter::trace::{load_trace, TraceEvent};

/// Replay a frame trace through the emotion stability voter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Frame trace (JSON lines: {"t": secs, "face": bool, "label": "happy"})
    #[arg(short, long)]
    trace: PathBuf,

    /// Config file (defaults to ~/.emotion-voter/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Confirmation mode: "ratio" or "continuous"
    #[arg(short, long)]
    mode: Option<ModeSetting>,

    /// Voting window (seconds)
    #[arg(long)]
    window_secs: Option<f64>,

    /// Observations required before a ratio vote
    #[arg(long)]
    min_observations: Option<usize>,

    /// Share of the window the top label needs (0.0 - 1.0]
    #[arg(long)]
    ratio: Option<f64>,

    /// Hold time for continuous mode (seconds)
    #[arg(long)]
    required_secs: Option<f64>,

    /// Keep the window when the face is lost
    #[arg(long)]
    keep_on_face_loss: bool,

    /// Play neutral media for a confirmed disgust
    #[arg(long)]
    fold_disgust: bool,

    /// Pace frames by their trace timestamps
    #[arg(long)]
    realtime: bool,

    /// Print the run record as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = apply_overrides(load_config(&args)?, &args);
    let detector_config = config.detector_config()?;

    info!("Emotion voter starting...");
    info!("Trace: {:?}", args.trace);
    info!("Mode: {}", config.mode.as_str());

    let events = load_trace(&args.trace)?;
    info!("Loaded {} trace events", events.len());

    let mut record = DetectionRecord::new(
        args.trace.display().to_string(),
        config.mode.as_str().to_string(),
    );
    record.trace_events = events.len();
    record.skipped_events = events
        .iter()
        .filter(|e| matches!(e, TraceEvent::Invalid { .. }))
        .count();

    let (handle, mut rx) = start_detector(detector_config)?;

    // Set up Ctrl+C handler
    let sender_ctrlc = handle.sender();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, stopping...");
        sender_ctrlc.stop();
    });

    tokio::spawn(feed_trace(events, handle.sender(), args.realtime));

    while let Some(msg) = rx.recv().await {
        match msg {
            DetectorMessage::Confirmed {
                result,
                playback_bucket,
            } => {
                if !args.json {
                    println!(
                        "[{}] stabilized: {} (plays {})",
                        format_ms(result.confirmed_at.as_millis() as u64),
                        result.label,
                        playback_bucket
                    );
                }
                record.add_confirmation(&result, playback_bucket);
            }

            DetectorMessage::Rejected(e) => {
                debug!("Rejected frame: {}", e);
                record.add_rejection();
            }

            DetectorMessage::Status(status) => {
                debug!(
                    "Status: state={}, window={}, detected={}",
                    status.state.as_str(),
                    status.window_len,
                    status.detected
                );
            }

            DetectorMessage::Stopped(stats) => {
                info!("Detector stopped");
                record.finalize(stats);
                break;
            }
        }
    }

    // Wait for detector thread
    handle.join();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_summary(&record);
    }

    info!("Run complete");
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    debug!("Config: {:?}", path);
    Config::load(&path)
}

fn apply_overrides(mut config: Config, args: &Args) -> Config {
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(secs) = args.window_secs {
        config.window_secs = secs;
    }
    if let Some(min) = args.min_observations {
        config.min_observations = min;
    }
    if let Some(ratio) = args.ratio {
        config.confirmation_ratio = ratio;
    }
    if let Some(secs) = args.required_secs {
        config.required_secs = secs;
    }
    if args.keep_on_face_loss {
        config.reset_on_face_loss = false;
    }
    if args.fold_disgust {
        config.fold_disgust_into_neutral = true;
    }
    config
}

/// Feed trace events to the detector, then ask it to finish
async fn feed_trace(events: Vec<TraceEvent>, sender: FrameSender, realtime: bool) {
    let start = tokio::time::Instant::now();

    for event in events {
        if sender.is_stopping() {
            break;
        }
        if realtime {
            tokio::time::sleep_until(start + event.at()).await;
        }

        match event {
            TraceEvent::Frame {
                at,
                face_present,
                label,
            } => sender.send_frame_at(face_present, label, at),
            TraceEvent::Reset { at } => {
                debug!("Trace reset at {:?}", at);
                sender.reset();
            }
            TraceEvent::Invalid { line, error, .. } => {
                warn!("Skipping trace line {}: {}", line, error);
            }
        }
    }

    sender.finish();
}

fn print_summary(record: &DetectionRecord) {
    println!("\n--- Run Summary ---");
    println!("Trace events: {}", record.trace_events);
    if record.skipped_events > 0 {
        println!("Skipped events: {}", record.skipped_events);
    }
    println!("Rejected frames: {}", record.rejected_frames);

    if let Some(stats) = &record.voter_stats {
        println!("Frames: {}", stats.frames);
        println!("Face losses: {}", stats.face_losses);
        println!("Votes below minimum: {}", stats.skipped_below_min);
        println!("Sub-threshold votes: {}", stats.sub_threshold_votes);
        if stats.frames > 0 && stats.confirmations == 0 {
            warn!("No episode confirmed; check window length against the frame rate");
        }
    }

    if record.confirmations.is_empty() {
        println!("\nNo stable emotion detected.");
    } else {
        println!("\n--- Confirmations ---\n");
        for line in record.confirmation_lines() {
            println!("{}", line);
        }
    }

    if record.voter_stats.is_none() {
        error!("Detector exited without reporting stats");
    }
}
