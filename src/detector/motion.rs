use super::background::{BackgroundModel, RunningAverageModel};
use super::contours::{ContourExtractor, ExternalContourExtractor};
use super::debounce::Debounce;
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::events::MotionEvent;
use crate::frame::FrameData;

use imageproc::{contrast::threshold, distance_transform::Norm, morphology::dilate};
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Foreground deltas above this luminance count as changed pixels
pub const LUMINANCE_CUTOFF: u8 = 25;

/// Dilation radius under the L-infinity norm (a 3x3 square element)
pub const DILATE_RADIUS: u8 = 1;

/// Counters for the detection loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub frames_debounced: u64,
    pub events_emitted: u64,
}

/// Turns frames into debounced, area-filtered motion events
pub struct MotionDetector {
    config: DetectorConfig,
    model: Box<dyn BackgroundModel>,
    extractor: Box<dyn ContourExtractor>,
    debounce: Debounce,
    stats: DetectorStats,
}

impl MotionDetector {
    pub fn new(
        config: DetectorConfig,
        model: Box<dyn BackgroundModel>,
        extractor: Box<dyn ContourExtractor>,
        start: Instant,
    ) -> Self {
        info!(
            "Motion detector ready: area threshold {:.1}, interval {:?}",
            config.contour_area_threshold,
            config.report_interval()
        );

        let debounce = Debounce::new(config.report_interval(), start);
        Self {
            config,
            model,
            extractor,
            debounce,
            stats: DetectorStats::default(),
        }
    }

    /// Running-average background with external contour extraction
    pub fn with_defaults(config: DetectorConfig, start: Instant) -> Self {
        let model = Box::new(RunningAverageModel::new(config.learning_rate));
        Self::new(config, model, Box::new(ExternalContourExtractor), start)
    }

    /// Analyze one frame. Emits at most one event per frame.
    pub fn process_frame(&mut self, frame: &FrameData, now: Instant) -> Result<Option<MotionEvent>> {
        if frame.is_empty() {
            trace!("Skipping empty frame {}", frame.id);
            self.stats.frames_skipped += 1;
            return Ok(None);
        }

        let gray = frame.to_gray_image()?;

        // The model keeps learning inside the debounce window
        let foreground = self.model.apply(&gray);
        self.stats.frames_processed += 1;

        if !self.debounce.is_open(now) {
            trace!(
                "Frame {} inside debounce window ({:?} left)",
                frame.id,
                self.debounce.remaining(now)
            );
            self.stats.frames_debounced += 1;
            return Ok(None);
        }

        let mask = dilate(
            &threshold(&foreground, LUMINANCE_CUTOFF),
            Norm::LInf,
            DILATE_RADIUS,
        );

        let area_threshold = self.config.contour_area_threshold;
        let largest = self
            .extractor
            .extract(&mask)
            .into_iter()
            .map(|contour| contour.area)
            .filter(|area| *area > area_threshold)
            .fold(None, |max: Option<f64>, area| {
                Some(max.map_or(area, |m| m.max(area)))
            });

        let Some(area) = largest else {
            debug!("No contour above {:.1} in frame {}", area_threshold, frame.id);
            return Ok(None);
        };

        // Converted only now; a failure leaves the window open for the next frame
        let image = frame.to_rgb_image()?;
        self.debounce.arm(now);
        self.stats.events_emitted += 1;

        let event = MotionEvent::new(frame.id, image, area);
        info!("Motion detected: {}", event.description());
        Ok(Some(event))
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn stats(&self) -> &DetectorStats {
        &self.stats
    }
}
