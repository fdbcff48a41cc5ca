use super::FrameSource;
use crate::config::CameraConfig;
use crate::error::{CameraError, Result};
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

/// V4L2 camera read through a GStreamer pipeline that decodes to packed RGB
pub struct GstFrameSource {
    config: CameraConfig,
    pipeline: Pipeline,
    appsink: AppSink,
    next_frame_id: u64,
}

impl GstFrameSource {
    /// Build and start the capture pipeline; any failure is reported as a
    /// device open failure
    pub async fn open(config: CameraConfig) -> Result<Self> {
        info!(
            "Opening camera device {} ({}x{} @ {}fps)",
            config.index, config.resolution.0, config.resolution.1, config.fps
        );

        let device = config.index;
        let open_error = |details: String| CameraError::DeviceOpen { device, details };

        gstreamer::init().map_err(|e| open_error(format!("Failed to initialize GStreamer: {}", e)))?;

        let pipeline_desc = Self::build_pipeline_string(&config);
        debug!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| open_error(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| open_error("Failed to downcast to Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| open_error("Failed to get appsink element".to_string()))?
            .downcast::<AppSink>()
            .map_err(|_| open_error("Failed to downcast to AppSink".to_string()))?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(open_error(format!("Failed to start pipeline: {}", e)).into());
        }

        // v4l2src reports a missing device while prerolling, not on set_state
        let probe = pipeline.clone();
        let (state_result, _, _) = tokio::task::spawn_blocking(move || {
            probe.state(gstreamer::ClockTime::from_seconds(5))
        })
        .await
        .map_err(|e| open_error(format!("Pipeline state probe panicked: {}", e)))?;

        if let Err(e) = state_result {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(open_error(format!("Pipeline failed to reach playing state: {}", e)).into());
        }

        info!("Camera device {} opened", config.index);

        Ok(Self {
            config,
            pipeline,
            appsink,
            next_frame_id: 0,
        })
    }

    /// Build GStreamer pipeline string for MJPEG capture decoded to RGB
    fn build_pipeline_string(config: &CameraConfig) -> String {
        let (width, height) = config.resolution;

        format!(
            "v4l2src device=/dev/video{} io-mode=mmap do-timestamp=true ! \
             image/jpeg,width={},height={},framerate={}/1 ! \
             jpegdec ! \
             videoconvert ! \
             video/x-raw,format=RGB ! \
             appsink name=sink sync=false max-buffers=2 drop=false",
            config.index, width, height, config.fps
        )
    }

    /// Copy a sample into a tightly packed RGB frame
    fn sample_to_frame(&mut self, sample: gstreamer::Sample) -> Result<FrameData> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::Read {
            details: "No buffer in sample".to_string(),
        })?;

        let caps = sample.caps().ok_or_else(|| CameraError::Read {
            details: "No caps in sample".to_string(),
        })?;

        let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::Read {
            details: format!("Failed to get video info: {}", e),
        })?;

        let map = buffer.map_readable().map_err(|e| CameraError::Read {
            details: format!("Failed to map buffer: {}", e),
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let row_bytes = width as usize * 3;
        let stride = video_info.stride()[0] as usize;
        let source = map.as_slice();

        let packed = if stride == row_bytes {
            source.get(..row_bytes * height as usize).map(<[u8]>::to_vec)
        } else {
            // Rows are padded to the stride; strip the padding
            let mut packed = Vec::with_capacity(row_bytes * height as usize);
            let mut complete = true;
            for row in 0..height as usize {
                match source.get(row * stride..row * stride + row_bytes) {
                    Some(bytes) => packed.extend_from_slice(bytes),
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            complete.then_some(packed)
        };

        let data = packed.ok_or_else(|| CameraError::Read {
            details: format!("Short buffer for {}x{} frame", width, height),
        })?;

        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;

        trace!("Captured frame {} ({}x{})", frame_id, width, height);

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Rgb24,
        ))
    }
}

#[async_trait]
impl FrameSource for GstFrameSource {
    async fn read(&mut self) -> Result<Option<FrameData>> {
        let appsink = self.appsink.clone();
        let pulled = tokio::task::spawn_blocking(move || {
            let sample = appsink.pull_sample();
            (sample, appsink.is_eos())
        })
        .await
        .map_err(|e| CameraError::Read {
            details: format!("Frame pull task failed: {}", e),
        })?;

        match pulled {
            (Ok(sample), _) => self.sample_to_frame(sample).map(Some),
            (Err(_), true) => {
                debug!("Camera {} reached end of stream", self.config.index);
                Ok(None)
            }
            (Err(e), false) => Err(CameraError::Read {
                details: format!("Failed to pull sample: {}", e),
            }
            .into()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop camera pipeline cleanly: {}", e);
        }
        info!("Camera device {} closed", self.config.index);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("/dev/video{}", self.config.index)
    }
}
