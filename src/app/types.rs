/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    Signal(String),
}

/// Component names used in the state table
pub(super) const DETECTOR: &str = "detector";
pub(super) const STORAGE: &str = "storage";
pub(super) const NOTIFIER: &str = "notifier";
pub(super) const CONTROLLER: &str = "controller";
