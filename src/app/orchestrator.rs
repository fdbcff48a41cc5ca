use super::state::ComponentStates;
use super::types::ShutdownReason;
use crate::camera::{CameraOpener, SourceOpener};
use crate::config::MotionwatchConfig;
use crate::detector::MotionDetector;
use crate::error::Result;
use crate::messenger::{Messenger, TelegramMessenger};
use crate::pipeline::{JpegSnapshotEncoder, SnapshotEncoder};
use crate::reporting::ReportingState;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The pluggable parts of the system, built from config or supplied directly
pub struct Collaborators {
    pub opener: Arc<dyn SourceOpener>,
    pub detector: MotionDetector,
    pub encoder: Arc<dyn SnapshotEncoder>,
    /// Present only when online reporting is on
    pub messenger: Option<Arc<dyn Messenger>>,
}

impl Collaborators {
    pub fn from_config(config: &MotionwatchConfig) -> Result<Self> {
        let messenger: Option<Arc<dyn Messenger>> = if config.report.online {
            Some(Arc::new(TelegramMessenger::from_config(&config.report)?))
        } else {
            None
        };

        Ok(Self {
            opener: Arc::new(CameraOpener::new(config.camera.clone())),
            detector: MotionDetector::with_defaults(config.detector.clone(), Instant::now()),
            encoder: Arc::new(JpegSnapshotEncoder::new(config.storage.jpeg_quality)),
            messenger,
        })
    }
}

/// A spawned component and its join handle
pub(super) struct ComponentTask {
    pub(super) name: &'static str,
    pub(super) handle: Option<JoinHandle<()>>,
}

/// Main application coordinator that manages all system components
pub struct MotionwatchOrchestrator {
    pub(super) config: MotionwatchConfig,
    pub(super) reporting: ReportingState,
    pub(super) online: bool,
    pub(super) collaborators: Option<Collaborators>,
    pub(super) tasks: Vec<ComponentTask>,

    // Lifecycle management
    pub(super) component_states: ComponentStates,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl MotionwatchOrchestrator {
    /// Create a new orchestrator with the given configuration
    pub async fn new(config: MotionwatchConfig) -> Result<Self> {
        config.validate()?;
        let collaborators = Collaborators::from_config(&config)?;
        Self::with_collaborators(config, collaborators)
    }

    /// Create an orchestrator around prebuilt components
    pub fn with_collaborators(config: MotionwatchConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let online = collaborators.messenger.is_some();

        info!(
            "Orchestrator created (online reporting {})",
            if online { "on" } else { "off" }
        );

        Ok(Self {
            config,
            reporting: ReportingState::new(),
            online,
            collaborators: Some(collaborators),
            tasks: Vec::new(),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &MotionwatchConfig {
        &self.config
    }

    /// Shared reporting switch; starts off
    pub fn reporting_state(&self) -> ReportingState {
        self.reporting.clone()
    }

    /// Whether the notifier and controller run
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Token observed by every component task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
