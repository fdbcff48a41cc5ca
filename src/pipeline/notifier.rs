use super::handoff::HandoffReceiver;
use crate::messenger::Messenger;
use crate::reporting::ReportingState;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to one stored snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// Reporting was switched off
    Suppressed,
    ReadFailed,
    SendFailed,
}

#[derive(Debug, Default)]
pub struct NotifierStats {
    pub photos_sent: AtomicU64,
    pub photos_suppressed: AtomicU64,
    pub photos_failed: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifierStatsSnapshot {
    pub photos_sent: u64,
    pub photos_suppressed: u64,
    pub photos_failed: u64,
}

impl NotifierStats {
    pub fn snapshot(&self) -> NotifierStatsSnapshot {
        NotifierStatsSnapshot {
            photos_sent: self.photos_sent.load(Ordering::Relaxed),
            photos_suppressed: self.photos_suppressed.load(Ordering::Relaxed),
            photos_failed: self.photos_failed.load(Ordering::Relaxed),
        }
    }
}

/// Sends stored snapshots to the operator chat while reporting is on.
/// Files are left on disk either way.
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
    chat_id: i64,
    reporting: ReportingState,
    stats: Arc<NotifierStats>,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn Messenger>, chat_id: i64, reporting: ReportingState) -> Self {
        Self {
            messenger,
            chat_id,
            reporting,
            stats: Arc::new(NotifierStats::default()),
        }
    }

    pub fn stats_handle(&self) -> Arc<NotifierStats> {
        Arc::clone(&self.stats)
    }

    pub async fn notify(&self, path: &Path) -> NotifyOutcome {
        if !self.reporting.is_enabled() {
            debug!("Reporting off, not sending {}", path.display());
            self.stats.photos_suppressed.fetch_add(1, Ordering::Relaxed);
            return NotifyOutcome::Suppressed;
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to read snapshot {}: {}", path.display(), e);
                self.stats.photos_failed.fetch_add(1, Ordering::Relaxed);
                return NotifyOutcome::ReadFailed;
            }
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot.jpeg".to_string());

        match self.messenger.send_photo(self.chat_id, bytes, &file_name).await {
            Ok(()) => {
                info!("Reported snapshot {} to chat {}", file_name, self.chat_id);
                self.stats.photos_sent.fetch_add(1, Ordering::Relaxed);
                NotifyOutcome::Sent
            }
            Err(e) => {
                warn!("Failed to send snapshot {}: {}", file_name, e);
                self.stats.photos_failed.fetch_add(1, Ordering::Relaxed);
                NotifyOutcome::SendFailed
            }
        }
    }

    pub async fn run(self, mut paths: HandoffReceiver<PathBuf>, cancel: CancellationToken) {
        info!("Notifier started for chat {}", self.chat_id);

        loop {
            let path = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                path = paths.recv() => path,
            };

            match path {
                Some(path) => {
                    self.notify(&path).await;
                }
                None => {
                    debug!("Snapshot hand-off closed");
                    break;
                }
            }
        }

        let stats = self.stats.snapshot();
        info!(
            "Notifier stopped ({} sent, {} suppressed, {} failed)",
            stats.photos_sent, stats.photos_suppressed, stats.photos_failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::handoff::{handoff, OverflowPolicy};
    use crate::reporting::ReportingController;
    use crate::messenger::InboundUpdate;
    use crate::testing::MockMessenger;
    use std::time::Duration;
    use tempfile::TempDir;

    fn snapshot(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"jpeg bytes").unwrap();
        path
    }

    #[tokio::test]
    async fn test_disabled_reporting_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(MockMessenger::new());
        let notifier = Notifier::new(messenger.clone(), 42, ReportingState::new());

        let path = snapshot(&dir, "a.jpeg");
        assert_eq!(notifier.notify(&path).await, NotifyOutcome::Suppressed);
        assert!(messenger.photos().is_empty());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_enabled_reporting_sends_file() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(MockMessenger::new());
        let state = ReportingState::new();
        state.enable();
        let notifier = Notifier::new(messenger.clone(), 42, state);

        let path = snapshot(&dir, "b.jpeg");
        assert_eq!(notifier.notify(&path).await, NotifyOutcome::Sent);

        let photos = messenger.photos();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].chat_id, 42);
        assert_eq!(photos[0].file_name, "b.jpeg");
        assert_eq!(photos[0].bytes, b"jpeg bytes");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(MockMessenger::new());
        let state = ReportingState::new();
        state.enable();
        let notifier = Notifier::new(messenger.clone(), 42, state);

        let missing = dir.path().join("gone.jpeg");
        assert_eq!(notifier.notify(&missing).await, NotifyOutcome::ReadFailed);

        messenger.fail_photos(true);
        let path = snapshot(&dir, "c.jpeg");
        assert_eq!(notifier.notify(&path).await, NotifyOutcome::SendFailed);

        messenger.fail_photos(false);
        assert_eq!(notifier.notify(&path).await, NotifyOutcome::Sent);
        assert_eq!(notifier.stats_handle().snapshot().photos_failed, 2);
    }

    #[tokio::test]
    async fn test_operator_toggle_gates_following_events() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(MockMessenger::new());
        let state = ReportingState::new();
        let mut controller = ReportingController::new(messenger.clone(), state.clone(), Duration::from_secs(1));
        let notifier = Notifier::new(messenger.clone(), 42, state);

        controller.handle_update(InboundUpdate::text(1, 42, "Enable")).await;
        let first = snapshot(&dir, "first.jpeg");
        assert_eq!(notifier.notify(&first).await, NotifyOutcome::Sent);

        controller.handle_update(InboundUpdate::text(2, 42, "Disable")).await;
        let second = snapshot(&dir, "second.jpeg");
        assert_eq!(notifier.notify(&second).await, NotifyOutcome::Suppressed);

        let photos = messenger.photos();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].file_name, "first.jpeg");
    }

    #[tokio::test]
    async fn test_run_drains_until_closed() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(MockMessenger::new());
        let state = ReportingState::new();
        state.enable();
        let notifier = Notifier::new(messenger.clone(), 42, state);

        let (tx, rx) = handoff("paths", 4, OverflowPolicy::Block);
        tx.send(snapshot(&dir, "1.jpeg")).await.unwrap();
        tx.send(snapshot(&dir, "2.jpeg")).await.unwrap();
        drop(tx);

        notifier.run(rx, CancellationToken::new()).await;

        let names: Vec<String> = messenger.photos().into_iter().map(|p| p.file_name).collect();
        assert_eq!(names, vec!["1.jpeg", "2.jpeg"]);
    }
}
