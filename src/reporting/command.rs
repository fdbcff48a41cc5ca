use std::fmt;

/// Prompt sent with the reply keyboard after every message
pub const MENU_PROMPT: &str = "Motion detection:";

/// Reply keyboard options, one per row
pub const MENU_OPTIONS: [&str; 2] = ["Enable", "Disable"];

/// Operator command recognized in inbound text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportCommand {
    Enable,
    Disable,
}

impl ReportCommand {
    /// Case-insensitive, surrounding whitespace and one leading `/` ignored
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let word = trimmed.strip_prefix('/').unwrap_or(trimmed);

        if word.eq_ignore_ascii_case("enable") {
            Some(Self::Enable)
        } else if word.eq_ignore_ascii_case("disable") {
            Some(Self::Disable)
        } else {
            None
        }
    }

    pub fn enables_reporting(&self) -> bool {
        matches!(self, Self::Enable)
    }
}

impl fmt::Display for ReportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enable => write!(f, "Enable"),
            Self::Disable => write!(f, "Disable"),
        }
    }
}
