//! Event dispatch: storage writer and notifier joined by bounded hand-offs

mod handoff;
mod notifier;
mod storage;

pub use handoff::{
    handoff, HandoffReceiver, HandoffSender, HandoffStats, HandoffStatsSnapshot, OverflowPolicy,
    SendOutcome,
};
pub use notifier::{Notifier, NotifierStats, NotifierStatsSnapshot, NotifyOutcome};
pub use storage::{
    day_bucket_name, snapshot_stem, JpegSnapshotEncoder, SnapshotEncoder, StorageStats,
    StorageStatsSnapshot, StorageWriter, StoredImage,
};
