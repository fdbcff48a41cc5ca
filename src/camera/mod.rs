mod source;

#[cfg(all(target_os = "linux", feature = "camera"))]
mod gstreamer_source;


pub use source::{CameraOpener, FrameSource, SourceOpener};

#[cfg(all(target_os = "linux", feature = "camera"))]
pub use gstreamer_source::GstFrameSource;
