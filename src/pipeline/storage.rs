use super::handoff::{HandoffReceiver, HandoffSender, SendOutcome};
use crate::config::StorageConfig;
use crate::error::{HandoffError, Result, StorageError};
use crate::events::MotionEvent;

use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_tz::Tz;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use std::fmt::Display;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Gives up on a name after this many suffixed attempts
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Turns an event image into file bytes
pub trait SnapshotEncoder: Send + Sync {
    fn encode(&self, image: &RgbImage) -> std::result::Result<Vec<u8>, StorageError>;

    /// File extension without the dot
    fn extension(&self) -> &'static str {
        "jpeg"
    }
}

/// Baseline JPEG at a fixed quality
#[derive(Debug, Clone, Copy)]
pub struct JpegSnapshotEncoder {
    quality: u8,
}

impl JpegSnapshotEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl SnapshotEncoder for JpegSnapshotEncoder {
    fn encode(&self, image: &RgbImage) -> std::result::Result<Vec<u8>, StorageError> {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.quality)
            .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
            .map_err(|e| StorageError::Encode {
                details: e.to_string(),
            })?;
        Ok(buffer)
    }
}

/// Where one event ended up on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub path: PathBuf,
    pub day_bucket: String,
}

/// `<YYYY>_<MonthName>_<D>`, day without zero padding
pub fn day_bucket_name<T>(at: &DateTime<T>) -> String
where
    T: TimeZone,
    T::Offset: Display,
{
    at.format("%Y_%B_%-d").to_string()
}

/// Nanosecond-resolution, filesystem-safe file stem
pub fn snapshot_stem<T>(at: &DateTime<T>) -> String
where
    T: TimeZone,
    T::Offset: Display,
{
    at.format("%Y-%m-%dT%H-%M-%S%.9f").to_string()
}

#[derive(Debug, Default)]
pub struct StorageStats {
    pub events_stored: AtomicU64,
    pub events_failed: AtomicU64,
    pub paths_forwarded: AtomicU64,
    pub paths_dropped: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStatsSnapshot {
    pub events_stored: u64,
    pub events_failed: u64,
    pub paths_forwarded: u64,
    pub paths_dropped: u64,
}

impl StorageStats {
    pub fn snapshot(&self) -> StorageStatsSnapshot {
        StorageStatsSnapshot {
            events_stored: self.events_stored.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            paths_forwarded: self.paths_forwarded.load(Ordering::Relaxed),
            paths_dropped: self.paths_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Write the whole snapshot; a failed write removes the partial file
async fn write_or_discard<W>(
    path: &Path,
    writer: &mut W,
    bytes: &[u8],
) -> std::result::Result<(), StorageError>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;

    let Err(source) = written else {
        return Ok(());
    };

    if let Err(e) = fs::remove_file(path).await {
        warn!("Failed to remove partial snapshot {}: {}", path.display(), e);
    }
    Err(StorageError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Persists motion events as day-bucketed snapshots
pub struct StorageWriter {
    base_path: PathBuf,
    timezone: Option<Tz>,
    encoder: Arc<dyn SnapshotEncoder>,
    forward: Option<HandoffSender<PathBuf>>,
    stats: Arc<StorageStats>,
}

impl StorageWriter {
    /// `forward` is `None` when online reporting is off; stored paths then go nowhere
    pub fn new(
        config: &StorageConfig,
        encoder: Arc<dyn SnapshotEncoder>,
        forward: Option<HandoffSender<PathBuf>>,
    ) -> Result<Self> {
        let timezone = config.parsed_timezone()?;

        info!(
            "Storage writer saving to {} ({}, forwarding {})",
            config.path,
            timezone.map_or_else(|| "local time".to_string(), |tz| tz.to_string()),
            if forward.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            base_path: PathBuf::from(&config.path),
            timezone,
            encoder,
            forward,
            stats: Arc::new(StorageStats::default()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn stats_handle(&self) -> Arc<StorageStats> {
        Arc::clone(&self.stats)
    }

    /// Persist one event using the current wall clock
    pub async fn store(&self, event: &MotionEvent) -> std::result::Result<StoredImage, StorageError> {
        self.store_at(event, Utc::now()).await
    }

    /// Persist one event as if received at `received_at`
    pub async fn store_at(
        &self,
        event: &MotionEvent,
        received_at: DateTime<Utc>,
    ) -> std::result::Result<StoredImage, StorageError> {
        let (day_bucket, stem) = match self.timezone {
            Some(tz) => {
                let local = received_at.with_timezone(&tz);
                (day_bucket_name(&local), snapshot_stem(&local))
            }
            None => {
                let local = received_at.with_timezone(&Local);
                (day_bucket_name(&local), snapshot_stem(&local))
            }
        };

        let directory = self.base_path.join(&day_bucket);
        fs::create_dir_all(&directory)
            .await
            .map_err(|source| StorageError::CreateDirectory {
                path: directory.display().to_string(),
                source,
            })?;

        let encoder = Arc::clone(&self.encoder);
        let image = event.image.clone();
        let bytes = tokio::task::spawn_blocking(move || encoder.encode(&image))
            .await
            .map_err(|e| StorageError::Encode {
                details: format!("encoder task failed: {}", e),
            })??;

        let path = self.write_unique(&directory, &stem, &bytes).await?;
        debug!(
            "Stored event {} as {} ({} bytes)",
            event.id,
            path.display(),
            bytes.len()
        );

        Ok(StoredImage { path, day_bucket })
    }

    async fn write_unique(
        &self,
        directory: &Path,
        stem: &str,
        bytes: &[u8],
    ) -> std::result::Result<PathBuf, StorageError> {
        let extension = self.encoder.extension();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = if attempt == 0 {
                format!("{}.{}", stem, extension)
            } else {
                format!("{}-{}.{}", stem, attempt, extension)
            };
            let path = directory.join(file_name);

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(StorageError::Write {
                        path: path.display().to_string(),
                        source,
                    })
                }
            };

            write_or_discard(&path, &mut file, bytes).await?;
            return Ok(path);
        }

        Err(StorageError::Write {
            path: directory.join(stem).display().to_string(),
            source: std::io::Error::new(ErrorKind::AlreadyExists, "no free file name"),
        })
    }

    /// Store one event and forward its path. Per-event failures are logged
    /// and never end the stage.
    async fn handle(&self, event: MotionEvent) {
        let stored = match self.store(&event).await {
            Ok(stored) => stored,
            Err(e) => {
                self.stats.events_failed.fetch_add(1, Ordering::Relaxed);
                error!("Dropping motion event {}: {}", event.id, e);
                return;
            }
        };
        self.stats.events_stored.fetch_add(1, Ordering::Relaxed);
        info!("Saved motion snapshot {}", stored.path.display());

        let Some(forward) = &self.forward else {
            return;
        };

        match forward.send(stored.path).await {
            Ok(SendOutcome::Delivered) => {
                self.stats.paths_forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Ok(SendOutcome::DisplacedOldest) => {
                self.stats.paths_forwarded.fetch_add(1, Ordering::Relaxed);
                self.stats.paths_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Notifier queue full, oldest pending snapshot dropped");
            }
            Ok(SendOutcome::DroppedNewest) => {
                self.stats.paths_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Notifier queue full, snapshot not queued for reporting");
            }
            Err(HandoffError::Closed(name)) => {
                warn!("Notifier hand-off '{}' closed, snapshot not reported", name);
            }
        }
    }

    /// Consume events until the input closes or `cancel` fires. Dropping the
    /// writer on return closes the notifier hand-off.
    pub async fn run(self, mut events: HandoffReceiver<MotionEvent>, cancel: CancellationToken) {
        info!("Storage writer started");

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Storage writer cancelled");
                    break;
                }
                event = events.recv() => event,
            };

            match event {
                Some(event) => self.handle(event).await,
                None => {
                    debug!("Motion event hand-off closed");
                    break;
                }
            }
        }

        let stats = self.stats.snapshot();
        info!(
            "Storage writer stopped ({} stored, {} failed, {} forwarded, {} dropped)",
            stats.events_stored, stats.events_failed, stats.paths_forwarded, stats.paths_dropped
        );
    }
}
