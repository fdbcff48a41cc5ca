use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotionwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Detector error: {0}")]
    Detector(#[from] DetectorError),

    #[error("Messenger error: {0}")]
    Messenger(#[from] MessengerError),

    #[error("Hand-off error: {0}")]
    Handoff(#[from] HandoffError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Frame source failures
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open capture device {device}: {details}")]
    DeviceOpen { device: u32, details: String },

    #[error("Frame read failed: {details}")]
    Read { details: String },

    #[error("Camera capture is not supported in this build")]
    Unsupported,
}

/// Frame conversion and analysis failures
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Frame processing failed: {details}")]
    FrameProcessing { details: String },
}

/// Snapshot persistence failures
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create day bucket {path}: {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode snapshot: {details}")]
    Encode { details: String },

    #[error("Failed to write snapshot {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Messaging transport failures
#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API call {method} rejected: {description}")]
    Api { method: String, description: String },

    #[error("Missing messenger credential")]
    MissingToken,
}

/// Pipeline hand-off failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandoffError {
    #[error("Hand-off channel '{0}' is closed")]
    Closed(String),
}

impl MotionwatchError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MotionwatchError>;
