pub mod processor;
pub mod status;

pub use processor::{
    start_detector, DetectorConfig, DetectorHandle, DetectorInput, DetectorMessage, FrameSender,
};
pub use status::DetectionStatus;
