use crate::config::CameraConfig;
use crate::error::Result;
use crate::frame::FrameData;
use async_trait::async_trait;

/// Sequential frame producer backed by a capture device
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame; `Ok(None)` means the stream has ended
    async fn read(&mut self) -> Result<Option<FrameData>>;

    /// Release the device
    async fn close(&mut self) -> Result<()>;

    /// Human-readable device name for logs
    fn describe(&self) -> String;
}

/// Opens a frame source inside the detector task, so a failed open only
/// takes down detection
#[async_trait]
pub trait SourceOpener: Send + Sync {
    async fn open(&self) -> Result<Box<dyn FrameSource>>;
}

/// Opens the configured V4L2 camera
pub struct CameraOpener {
    config: CameraConfig,
}

impl CameraOpener {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
}

#[async_trait]
impl SourceOpener for CameraOpener {
    #[cfg(all(target_os = "linux", feature = "camera"))]
    async fn open(&self) -> Result<Box<dyn FrameSource>> {
        let source = super::GstFrameSource::open(self.config.clone()).await?;
        Ok(Box::new(source))
    }

    #[cfg(not(all(target_os = "linux", feature = "camera")))]
    async fn open(&self) -> Result<Box<dyn FrameSource>> {
        tracing::warn!(
            "Camera {} requested but capture support is not compiled in",
            self.config.index
        );
        Err(crate::error::CameraError::Unsupported.into())
    }
}
