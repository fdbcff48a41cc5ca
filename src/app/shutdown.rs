use super::types::{DETECTOR, NOTIFIER, STORAGE};
use super::{ComponentState, MotionwatchOrchestrator};
use crate::error::{MotionwatchError, Result};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

/// How long a cancelled component gets to finish
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl MotionwatchOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        // Tasks were spawned consumers first; stop the producer first
        let names: Vec<&'static str> = self.tasks.iter().rev().map(|task| task.name).collect();
        for name in names {
            if let Err(e) = self.stop_component(name, STOP_TIMEOUT).await {
                error!("Error stopping {}: {}", name, e);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Wait for the detector and the stages behind it to finish on their own,
    /// as they do after the frame stream ends
    pub async fn wait_for_pipeline(&mut self, limit: Duration) -> Result<()> {
        for name in [DETECTOR, STORAGE, NOTIFIER] {
            if self.tasks.iter().any(|task| task.name == name) {
                self.stop_component(name, limit).await?;
            }
        }
        Ok(())
    }

    /// Join one component task
    async fn stop_component(&mut self, component: &'static str, limit: Duration) -> Result<()> {
        let Some(mut handle) = self
            .tasks
            .iter_mut()
            .find(|task| task.name == component)
            .and_then(|task| task.handle.take())
        else {
            return Ok(());
        };

        info!("Stopping {} component", component);
        if self.get_component_state(component).await != Some(ComponentState::Failed) {
            self.set_component_state(component, ComponentState::Stopping)
                .await;
        }

        match timeout(limit, &mut handle).await {
            Ok(Ok(())) => {
                // A component that failed on its own keeps its Failed state
                if self.get_component_state(component).await != Some(ComponentState::Failed) {
                    self.set_component_state(component, ComponentState::Stopped)
                        .await;
                }
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component task failed: {}", component, e);
                Err(MotionwatchError::component(component.to_string(), e.to_string()))
            }
            Err(_) => {
                handle.abort();
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(MotionwatchError::component(
                    component.to_string(),
                    "stop timeout".to_string(),
                ))
            }
        }
    }
}
