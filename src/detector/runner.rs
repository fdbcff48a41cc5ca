use super::motion::MotionDetector;
use crate::camera::SourceOpener;
use crate::events::MotionEvent;
use crate::pipeline::HandoffSender;

use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why the detection loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorExit {
    /// The frame source could not be opened
    OpenFailed,
    /// The source reported end of stream
    StreamEnded,
    /// Reading a frame failed
    ReadFailed,
    Cancelled,
    /// Nothing is consuming motion events any more
    PipelineClosed,
    /// Frame analysis panicked
    Panicked,
}

impl DetectorExit {
    /// Exits that happen without anyone asking for them
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::OpenFailed | Self::ReadFailed | Self::Panicked)
    }
}

/// Read frames and forward motion events until the stream ends or `cancel`
/// fires. The sender is dropped on return, which closes the downstream stages.
pub async fn run_detector(
    opener: Arc<dyn SourceOpener>,
    mut detector: MotionDetector,
    events: HandoffSender<MotionEvent>,
    cancel: CancellationToken,
) -> DetectorExit {
    let mut source = match opener.open().await {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open frame source: {}", e);
            return DetectorExit::OpenFailed;
        }
    };
    info!("Motion detector reading from {}", source.describe());

    let exit = loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break DetectorExit::Cancelled,
            read = source.read() => read,
        };

        let frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                warn!("Frame stream ended");
                break DetectorExit::StreamEnded;
            }
            Err(e) => {
                error!("Failed to read frame: {}", e);
                break DetectorExit::ReadFailed;
            }
        };

        let now = Instant::now();
        let analyzed = tokio::task::spawn_blocking(move || {
            let result = detector.process_frame(&frame, now);
            (detector, result)
        })
        .await;

        let result = match analyzed {
            Ok((returned, result)) => {
                detector = returned;
                result
            }
            Err(e) => {
                error!("Frame analysis task failed: {}", e);
                break DetectorExit::Panicked;
            }
        };

        let event = match result {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping frame: {}", e);
                continue;
            }
        };

        let event_id = event.id;
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break DetectorExit::Cancelled,
            sent = events.send(event) => sent,
        };

        match sent {
            Ok(outcome) => debug!("Motion event {} handed off ({:?})", event_id, outcome),
            Err(e) => {
                warn!("Stopping detector: {}", e);
                break DetectorExit::PipelineClosed;
            }
        }
    };

    if let Err(e) = source.close().await {
        warn!("Failed to close frame source: {}", e);
    }

    info!("Motion detector stopped: {:?}", exit);
    exit
}
