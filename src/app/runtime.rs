use super::{MotionwatchOrchestrator, ShutdownReason};
use crate::error::{MotionwatchError, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

impl MotionwatchOrchestrator {
    /// Run until a shutdown signal arrives, then stop every component
    pub async fn run(&mut self) -> Result<i32> {
        info!("motionwatch is running");

        // Set up signal handling for graceful shutdown
        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| MotionwatchError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| MotionwatchError::system("Shutdown receiver already taken"))?;

        // Spawn signal handlers
        self.setup_signal_handlers(shutdown_sender).await;

        // A detector that stops on its own does not end the process
        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| MotionwatchError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        // Perform graceful shutdown
        let exit_code = self.shutdown().await?;

        info!("motionwatch shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    async fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };

                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
