use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared on/off switch for photo reporting. Starts disabled.
///
/// Only the controller writes it; the notifier reads it before every send.
#[derive(Debug, Clone, Default)]
pub struct ReportingState {
    enabled: Arc<AtomicBool>,
}

impl ReportingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns the previous value
    pub fn set(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel)
    }

    pub fn enable(&self) -> bool {
        self.set(true)
    }

    pub fn disable(&self) -> bool {
        self.set(false)
    }
}
