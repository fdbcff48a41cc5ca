use image::RgbImage;
use std::time::SystemTime;
use uuid::Uuid;

/// A debounced, threshold-qualified detection carrying the frame that caused it
#[derive(Debug, Clone)]
pub struct MotionEvent {
    /// Correlates the event across pipeline log lines
    pub id: Uuid,
    /// Source frame that triggered the event
    pub frame_id: u64,
    /// Triggering frame in portable RGB form
    pub image: RgbImage,
    /// When the detector emitted the event
    pub created_at: SystemTime,
    /// Largest qualifying contour area in the frame
    pub contour_area: f64,
}

impl MotionEvent {
    pub fn new(frame_id: u64, image: RgbImage, contour_area: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            frame_id,
            image,
            created_at: SystemTime::now(),
            contour_area,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        format!(
            "Motion event {} from frame {} ({}x{}, area {:.2})",
            self.id,
            self.frame_id,
            self.image.width(),
            self.image.height(),
            self.contour_area
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_event_ids_are_unique() {
        let first = MotionEvent::new(1, RgbImage::new(2, 2), 4500.0);
        let second = MotionEvent::new(2, RgbImage::new(2, 2), 4500.0);

        assert_ne!(first.id, second.id);
        assert!(first.created_at <= second.created_at);
    }

    #[test]
    fn test_motion_event_description() {
        let event = MotionEvent::new(7, RgbImage::new(640, 480), 5123.456);
        let description = event.description();

        assert!(description.contains("frame 7"));
        assert!(description.contains("640x480"));
        assert!(description.contains("5123.46"));
    }
}
