pub mod app;
pub mod camera;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod frame;
pub mod messenger;
pub mod pipeline;
pub mod reporting;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{Collaborators, ComponentState, MotionwatchOrchestrator, ShutdownReason};
pub use camera::{CameraOpener, FrameSource, SourceOpener};
pub use config::{ConfigOverrides, MotionwatchConfig};
pub use detector::{run_detector, DetectorExit, MotionDetector};
pub use error::{MotionwatchError, Result};
pub use events::MotionEvent;
pub use frame::{FrameData, FrameFormat};
pub use messenger::{InboundUpdate, Messenger, TelegramMessenger};
pub use pipeline::{handoff, Notifier, OverflowPolicy, StorageWriter};
pub use reporting::{ReportCommand, ReportingController, ReportingState};
