use crate::error::DetectorError;
use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layouts a frame source can hand to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// Packed 8-bit RGB
    Rgb24,
    /// Single 8-bit luminance channel
    Gray8,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Rgb24 => 3,
            FrameFormat::Gray8 => 1,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// Frame data structure containing raw frame data and metadata
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Sequential frame identifier assigned by the source
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Wrap an RGB image as a frame
    pub fn from_rgb(id: u64, timestamp: SystemTime, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(id, timestamp, image.into_raw(), width, height, FrameFormat::Rgb24)
    }

    /// Wrap a grayscale image as a frame
    pub fn from_gray(id: u64, timestamp: SystemTime, image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(id, timestamp, image.into_raw(), width, height, FrameFormat::Gray8)
    }

    /// A frame with no pixels carries nothing to analyze
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true, // Compressed formats have variable size
        }
    }

    /// Luminance view used by the background model
    pub fn to_gray_image(&self) -> Result<GrayImage, DetectorError> {
        self.ensure_size()?;

        match self.format {
            FrameFormat::Gray8 => GrayImage::from_raw(self.width, self.height, self.data.to_vec())
                .ok_or_else(|| DetectorError::FrameProcessing {
                    details: "Failed to create grayscale image from raw data".to_string(),
                }),
            FrameFormat::Rgb24 => {
                let rgb = self.to_rgb_image()?;
                let mut gray = GrayImage::new(self.width, self.height);
                for (x, y, pixel) in rgb.enumerate_pixels() {
                    let value = 0.299 * pixel[0] as f32
                        + 0.587 * pixel[1] as f32
                        + 0.114 * pixel[2] as f32;
                    gray.put_pixel(x, y, Luma([value as u8]));
                }
                Ok(gray)
            }
            FrameFormat::Mjpeg => image::load_from_memory(&self.data)
                .map(|decoded| decoded.to_luma8())
                .map_err(|e| DetectorError::FrameProcessing {
                    details: format!("MJPEG decode failed: {}", e),
                }),
        }
    }

    /// Portable RGB form; only built when a frame triggers an event
    pub fn to_rgb_image(&self) -> Result<RgbImage, DetectorError> {
        self.ensure_size()?;

        match self.format {
            FrameFormat::Rgb24 => RgbImage::from_raw(self.width, self.height, self.data.to_vec())
                .ok_or_else(|| DetectorError::FrameProcessing {
                    details: "Failed to create RGB image from raw data".to_string(),
                }),
            FrameFormat::Gray8 => {
                let gray = self.to_gray_image()?;
                Ok(image::DynamicImage::ImageLuma8(gray).to_rgb8())
            }
            FrameFormat::Mjpeg => image::load_from_memory(&self.data)
                .map(|decoded| decoded.to_rgb8())
                .map_err(|e| DetectorError::FrameProcessing {
                    details: format!("MJPEG decode failed: {}", e),
                }),
        }
    }

    fn ensure_size(&self) -> Result<(), DetectorError> {
        if self.validate_size() {
            Ok(())
        } else {
            Err(DetectorError::FrameProcessing {
                details: format!(
                    "Frame {} has {} bytes, expected {:?} for {}x{} {:?}",
                    self.id,
                    self.data.len(),
                    self.expected_size(),
                    self.width,
                    self.height,
                    self.format
                ),
            })
        }
    }
}
