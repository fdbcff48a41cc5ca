mod background;
mod contours;
mod debounce;
mod motion;
mod runner;

pub use background::{BackgroundModel, RunningAverageModel};
pub use contours::{polygon_area, Contour, ContourExtractor, ExternalContourExtractor};
pub use debounce::Debounce;
pub use motion::{DetectorStats, MotionDetector, DILATE_RADIUS, LUMINANCE_CUTOFF};
pub use runner::{run_detector, DetectorExit};
