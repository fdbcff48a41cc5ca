use crate::pipeline::OverflowPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Longest long-poll the bot API is asked to hold open
pub const MAX_POLL_TIMEOUT_SECONDS: u64 = 300;

/// Longest allowed gap between two motion events (one day)
pub const MAX_REPORT_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionwatchConfig {
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub storage: StorageConfig,
    pub report: ReportConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the device
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorConfig {
    /// Minimum time between two motion events, in milliseconds
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,

    /// Contour area a region must exceed to count as motion
    #[serde(default = "default_contour_area_threshold")]
    pub contour_area_threshold: f64,

    /// Background model learning rate (0.0 - 1.0)
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Base directory that holds the day buckets
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// JPEG quality for stored snapshots (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// IANA timezone used for day bucket names; local time when unset
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReportConfig {
    /// Enable the online reporting channel
    #[serde(default)]
    pub online: bool,

    /// Bot access token
    #[serde(default)]
    pub token: Option<String>,

    /// Chat that receives snapshots
    #[serde(default)]
    pub chat_id: i64,

    /// Base URL of the bot API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Long-poll timeout for command updates, in seconds
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// Queue depth between the detector and the storage writer
    #[serde(default = "default_queue_capacity")]
    pub storage_capacity: usize,

    /// Queue depth between the storage writer and the notifier
    #[serde(default = "default_queue_capacity")]
    pub notify_capacity: usize,

    /// What to do when a queue is full
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

/// Values supplied on the command line; `None` leaves the loaded value alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub online: Option<bool>,
    pub token: Option<String>,
    pub camera_index: Option<u32>,
    pub chat_id: Option<i64>,
    pub report_interval_ms: Option<u64>,
    pub contour_area_threshold: Option<f64>,
}

impl DetectorConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

impl ReportConfig {
    /// Token if one was configured and is not blank
    pub fn credential(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_seconds)
    }
}

impl StorageConfig {
    /// Parsed bucket timezone, `None` meaning local time
    pub fn parsed_timezone(&self) -> Result<Option<chrono_tz::Tz>, ConfigError> {
        match self.timezone.as_deref() {
            None => Ok(None),
            Some(name) => name.parse::<chrono_tz::Tz>().map(Some).map_err(|e| {
                ConfigError::Message(format!("Invalid storage timezone '{}': {}", name, e))
            }),
        }
    }
}

impl MotionwatchConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("motionwatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default(
                "detector.report_interval_ms",
                default_report_interval_ms() as i64,
            )?
            .set_default(
                "detector.contour_area_threshold",
                default_contour_area_threshold(),
            )?
            .set_default("detector.learning_rate", default_learning_rate() as f64)?
            .set_default("storage.path", default_storage_path())?
            .set_default("storage.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("report.online", false)?
            .set_default("report.chat_id", 0i64)?
            .set_default("report.api_url", default_api_url())?
            .set_default(
                "report.poll_timeout_seconds",
                default_poll_timeout_seconds() as i64,
            )?
            .set_default("pipeline.storage_capacity", default_queue_capacity() as i64)?
            .set_default("pipeline.notify_capacity", default_queue_capacity() as i64)?
            .set_default("pipeline.overflow", "block")?
            // Configuration file is optional; format follows the extension
            .add_source(File::with_name(&path_str).required(false))
            // MOTIONWATCH_REPORT__CHAT_ID=42
            .add_source(
                Environment::with_prefix("MOTIONWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: MotionwatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config.redacted());

        Ok(config)
    }

    /// Apply command line overrides on top of the loaded configuration
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(online) = overrides.online {
            self.report.online = online;
        }
        if let Some(token) = &overrides.token {
            self.report.token = Some(token.clone());
        }
        if let Some(index) = overrides.camera_index {
            self.camera.index = index;
        }
        if let Some(chat_id) = overrides.chat_id {
            self.report.chat_id = chat_id;
        }
        if let Some(interval) = overrides.report_interval_ms {
            self.detector.report_interval_ms = interval;
        }
        if let Some(threshold) = overrides.contour_area_threshold {
            self.detector.contour_area_threshold = threshold;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.detector.report_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Detector report_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.detector.report_interval_ms > MAX_REPORT_INTERVAL_MS {
            return Err(ConfigError::Message(format!(
                "Detector report_interval_ms must not exceed {}",
                MAX_REPORT_INTERVAL_MS
            )));
        }

        let threshold = self.detector.contour_area_threshold;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(ConfigError::Message(
                "Detector contour_area_threshold must be a non-negative number".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.detector.learning_rate) {
            return Err(ConfigError::Message(
                "Detector learning_rate must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.storage.jpeg_quality) {
            return Err(ConfigError::Message(
                "Storage jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        self.storage.parsed_timezone()?;

        if self.pipeline.storage_capacity == 0 || self.pipeline.notify_capacity == 0 {
            return Err(ConfigError::Message(
                "Pipeline queue capacities must be greater than 0".to_string(),
            ));
        }

        if self.report.online {
            if self.report.credential().is_none() {
                return Err(ConfigError::Message(
                    "Online reporting requires a bot token".to_string(),
                ));
            }

            if self.report.poll_timeout_seconds == 0 {
                return Err(ConfigError::Message(
                    "Report poll_timeout_seconds must be greater than 0".to_string(),
                ));
            }
        }

        if self.report.poll_timeout_seconds > MAX_POLL_TIMEOUT_SECONDS {
            return Err(ConfigError::Message(format!(
                "Report poll_timeout_seconds must not exceed {}",
                MAX_POLL_TIMEOUT_SECONDS
            )));
        }

        Ok(())
    }

    /// Copy with the credential masked, for logging
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.report.token.is_some() {
            copy.report.token = Some("***".to_string());
        }
        copy
    }
}

impl Default for MotionwatchConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
            },
            detector: DetectorConfig {
                report_interval_ms: default_report_interval_ms(),
                contour_area_threshold: default_contour_area_threshold(),
                learning_rate: default_learning_rate(),
            },
            storage: StorageConfig {
                path: default_storage_path(),
                jpeg_quality: default_jpeg_quality(),
                timezone: None,
            },
            report: ReportConfig {
                online: false,
                token: None,
                chat_id: 0,
                api_url: default_api_url(),
                poll_timeout_seconds: default_poll_timeout_seconds(),
            },
            pipeline: PipelineConfig {
                storage_capacity: default_queue_capacity(),
                notify_capacity: default_queue_capacity(),
                overflow: OverflowPolicy::default(),
            },
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}

fn default_report_interval_ms() -> u64 {
    500
}
fn default_contour_area_threshold() -> f64 {
    4000.0
}
fn default_learning_rate() -> f32 {
    0.05
}

fn default_storage_path() -> String {
    ".".to_string()
}
fn default_jpeg_quality() -> u8 {
    75
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}
fn default_poll_timeout_seconds() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    8
}
