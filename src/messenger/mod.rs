//! Outbound photo delivery and inbound command polling

mod telegram;

pub use telegram::TelegramMessenger;

use crate::error::MessengerError;
use async_trait::async_trait;
use std::time::Duration;

/// One update from the messaging service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub update_id: i64,
    pub message: Option<InboundMessage>,
}

/// The message part of an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub text: Option<String>,
}

impl InboundUpdate {
    pub fn text(update_id: i64, chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            update_id,
            message: Some(InboundMessage {
                chat_id,
                text: Some(text.into()),
            }),
        }
    }
}

/// Messaging transport used by the notifier and the reporting controller
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Check the credential; returns the account name on success
    async fn verify(&self) -> Result<String, MessengerError>;

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: Vec<u8>,
        file_name: &str,
    ) -> Result<(), MessengerError>;

    /// Long-poll for updates with id >= `offset`
    async fn poll_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<InboundUpdate>, MessengerError>;

    /// Send `text` with a reply keyboard, one option per row
    async fn send_menu(
        &self,
        chat_id: i64,
        text: &str,
        options: &[&str],
    ) -> Result<(), MessengerError>;
}
