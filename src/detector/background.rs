use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, info};

/// Statistical model of the static scene
pub trait BackgroundModel: Send {
    /// Foreground delta of `frame` against the learned scene. Every call also
    /// feeds the frame into the model.
    fn apply(&mut self, frame: &GrayImage) -> GrayImage;
}

/// Exponential running average of blurred luminance
pub struct RunningAverageModel {
    learning_rate: f32,
    blur_sigma: f32,
    background: Option<Vec<f32>>,
    dimensions: (u32, u32),
    frames_seen: u64,
}

impl RunningAverageModel {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate: learning_rate.clamp(0.0, 1.0),
            blur_sigma: 2.0,
            background: None,
            dimensions: (0, 0),
            frames_seen: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.background.is_some()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    fn reset(&mut self, frame: &GrayImage) {
        self.dimensions = frame.dimensions();
        self.background = Some(frame.pixels().map(|p| p[0] as f32).collect());
    }
}

impl BackgroundModel for RunningAverageModel {
    fn apply(&mut self, frame: &GrayImage) -> GrayImage {
        let blurred = gaussian_blur_f32(frame, self.blur_sigma);
        self.frames_seen += 1;

        if self.background.is_none() {
            info!("Initializing background model with first frame");
            self.reset(&blurred);
            return GrayImage::new(blurred.width(), blurred.height());
        }

        if self.dimensions != blurred.dimensions() {
            debug!(
                "Frame size changed from {:?} to {:?}, relearning background",
                self.dimensions,
                blurred.dimensions()
            );
            self.reset(&blurred);
            return GrayImage::new(blurred.width(), blurred.height());
        }

        let rate = self.learning_rate;
        let mut delta = GrayImage::new(blurred.width(), blurred.height());

        if let Some(background) = self.background.as_mut() {
            for ((bg, current), out) in background
                .iter_mut()
                .zip(blurred.pixels())
                .zip(delta.pixels_mut())
            {
                let value = current[0] as f32;
                *out = Luma([(value - *bg).abs().min(255.0) as u8]);
                *bg = *bg * (1.0 - rate) + value * rate;
            }
        }

        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    #[test]
    fn test_first_frame_has_no_foreground() {
        let mut model = RunningAverageModel::new(0.05);
        let delta = model.apply(&uniform(32, 24, 200));

        assert!(model.is_initialized());
        assert_eq!(delta.dimensions(), (32, 24));
        assert!(delta.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_change_shows_up_as_foreground() {
        let mut model = RunningAverageModel::new(0.05);
        model.apply(&uniform(32, 24, 20));

        let delta = model.apply(&uniform(32, 24, 220));
        let centre = delta.get_pixel(16, 12)[0];
        assert!(centre >= 190, "expected strong delta, got {}", centre);
    }

    #[test]
    fn test_static_scene_is_learned() {
        let mut model = RunningAverageModel::new(0.5);
        model.apply(&uniform(16, 16, 0));

        let mut last = 255u8;
        for _ in 0..20 {
            let delta = model.apply(&uniform(16, 16, 180));
            last = delta.get_pixel(8, 8)[0];
        }
        assert!(last < 5, "background should converge, delta still {}", last);
        assert_eq!(model.frames_seen(), 21);
    }

    #[test]
    fn test_resolution_change_relearns() {
        let mut model = RunningAverageModel::new(0.05);
        model.apply(&uniform(16, 16, 10));

        let delta = model.apply(&uniform(8, 8, 250));
        assert_eq!(delta.dimensions(), (8, 8));
        assert!(delta.pixels().all(|p| p[0] == 0));
    }
}
