//! Operator control over photo reporting

mod command;
mod controller;
mod state;

pub use command::{ReportCommand, MENU_OPTIONS, MENU_PROMPT};
pub use controller::{ReportingController, POLL_RETRY_DELAY};
pub use state::ReportingState;
