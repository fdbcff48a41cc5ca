use super::orchestrator::ComponentTask;
use super::state::record_state;
use super::types::{CONTROLLER, DETECTOR, NOTIFIER, STORAGE};
use super::{ComponentState, MotionwatchOrchestrator};
use crate::detector::run_detector;
use crate::error::{MotionwatchError, Result};
use crate::pipeline::{handoff, Notifier, StorageWriter};
use crate::reporting::ReportingController;
use std::sync::Arc;
use tracing::{error, info, warn};

impl MotionwatchOrchestrator {
    /// Initialize all system components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing motionwatch components");

        let mut states = self.component_states.lock().await;
        states.insert(DETECTOR.to_string(), ComponentState::Stopped);
        states.insert(STORAGE.to_string(), ComponentState::Stopped);

        // Reporting components exist only when online reporting is on
        if self.online {
            states.insert(NOTIFIER.to_string(), ComponentState::Stopped);
            states.insert(CONTROLLER.to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Verify the messenger, wire the hand-offs and spawn every component
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting motionwatch");

        let collaborators = self
            .collaborators
            .take()
            .ok_or_else(|| MotionwatchError::system("Components already started"))?;

        // A rejected credential aborts before anything runs
        if let Some(messenger) = &collaborators.messenger {
            let account = messenger.verify().await.map_err(|e| {
                error!("Messenger rejected the configured credential: {}", e);
                e
            })?;
            info!("Authorized on messenger as {}", account);
        }

        let pipeline = &self.config.pipeline;
        let (event_tx, event_rx) = handoff("motion-events", pipeline.storage_capacity, pipeline.overflow);

        let (path_tx, path_rx) = if self.online {
            let (tx, rx) = handoff("snapshot-paths", pipeline.notify_capacity, pipeline.overflow);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        // Downstream first, so every consumer exists before its producer
        let writer = StorageWriter::new(&self.config.storage, collaborators.encoder, path_tx)?;
        self.spawn_stage(STORAGE, writer.run(event_rx, self.cancellation_token.clone()))
            .await;

        if let (Some(messenger), Some(path_rx)) = (&collaborators.messenger, path_rx) {
            let notifier = Notifier::new(
                Arc::clone(messenger),
                self.config.report.chat_id,
                self.reporting.clone(),
            );
            self.spawn_stage(NOTIFIER, notifier.run(path_rx, self.cancellation_token.clone()))
                .await;

            let controller = ReportingController::new(
                Arc::clone(messenger),
                self.reporting.clone(),
                self.config.report.poll_timeout(),
            );
            self.spawn_stage(CONTROLLER, controller.run(self.cancellation_token.clone()))
                .await;
        } else {
            info!("Online reporting disabled, snapshots are only stored");
        }

        self.set_component_state(DETECTOR, ComponentState::Starting)
            .await;
        let states = Arc::clone(&self.component_states);
        let detection = run_detector(
            collaborators.opener,
            collaborators.detector,
            event_tx,
            self.cancellation_token.clone(),
        );
        let handle = tokio::spawn(async move {
            record_state(&states, DETECTOR, ComponentState::Running).await;
            let exit = detection.await;
            if exit.is_failure() {
                // The rest of the system keeps running without detection
                warn!("Motion detection unavailable: {:?}", exit);
                record_state(&states, DETECTOR, ComponentState::Failed).await;
            } else {
                record_state(&states, DETECTOR, ComponentState::Stopped).await;
            }
        });
        self.tasks.push(ComponentTask {
            name: DETECTOR,
            handle: Some(handle),
        });

        info!("motionwatch started successfully");
        Ok(())
    }

    async fn spawn_stage<F>(&mut self, name: &'static str, stage: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.set_component_state(name, ComponentState::Starting).await;

        let states = Arc::clone(&self.component_states);
        let handle = tokio::spawn(async move {
            record_state(&states, name, ComponentState::Running).await;
            stage.await;
            record_state(&states, name, ComponentState::Stopped).await;
        });

        self.tasks.push(ComponentTask {
            name,
            handle: Some(handle),
        });
        info!("{} component started", name);
    }
}
