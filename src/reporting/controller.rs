use super::command::{ReportCommand, MENU_OPTIONS, MENU_PROMPT};
use super::state::ReportingState;
use crate::error::MessengerError;
use crate::messenger::{InboundUpdate, Messenger};

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Pause after a failed poll before trying again
pub const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Lets the operator switch photo reporting on and off from the chat
pub struct ReportingController {
    messenger: Arc<dyn Messenger>,
    state: ReportingState,
    poll_timeout: Duration,
    retry_delay: Duration,
    offset: i64,
}

impl ReportingController {
    pub fn new(messenger: Arc<dyn Messenger>, state: ReportingState, poll_timeout: Duration) -> Self {
        Self {
            messenger,
            state,
            poll_timeout,
            retry_delay: POLL_RETRY_DELAY,
            offset: 0,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Next update id to request
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Apply one update and acknowledge it. Returns the command it carried.
    pub async fn handle_update(&mut self, update: InboundUpdate) -> Option<ReportCommand> {
        self.offset = self.offset.max(update.update_id + 1);

        let Some(message) = update.message else {
            trace!("Update {} has no message", update.update_id);
            return None;
        };

        let command = message.text.as_deref().and_then(ReportCommand::parse);
        match command {
            Some(command) => {
                let enabled = command.enables_reporting();
                let was_enabled = self.state.set(enabled);
                info!(
                    "Reporting {} by chat {} (was {})",
                    if enabled { "enabled" } else { "disabled" },
                    message.chat_id,
                    if was_enabled { "on" } else { "off" }
                );
            }
            None => debug!(
                "Ignoring message from chat {}: {:?}",
                message.chat_id, message.text
            ),
        }

        if let Err(e) = self
            .messenger
            .send_menu(message.chat_id, MENU_PROMPT, &MENU_OPTIONS)
            .await
        {
            warn!("Failed to acknowledge chat {}: {}", message.chat_id, e);
        }

        command
    }

    /// One long-poll round; returns how many updates were handled
    pub async fn poll_once(&mut self) -> Result<usize, MessengerError> {
        let updates = self
            .messenger
            .poll_updates(self.offset, self.poll_timeout)
            .await?;

        let count = updates.len();
        for update in updates {
            self.handle_update(update).await;
        }
        Ok(count)
    }

    /// Poll until cancelled
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Reporting controller started (poll timeout {:?})", self.poll_timeout);

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = self.poll_once() => polled,
            };

            if let Err(e) = polled {
                warn!("Polling for updates failed: {}; retrying in {:?}", e, self.retry_delay);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }

        info!("Reporting controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::InboundMessage;
    use crate::testing::MockMessenger;

    fn controller(messenger: &Arc<MockMessenger>, state: &ReportingState) -> ReportingController {
        ReportingController::new(messenger.clone(), state.clone(), Duration::from_secs(1))
            .with_retry_delay(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_enable_and_disable_flip_state() {
        let messenger = Arc::new(MockMessenger::new());
        let state = ReportingState::new();
        let mut controller = controller(&messenger, &state);

        let command = controller.handle_update(InboundUpdate::text(1, 42, "Enable")).await;
        assert_eq!(command, Some(ReportCommand::Enable));
        assert!(state.is_enabled());

        controller.handle_update(InboundUpdate::text(2, 42, "/disable")).await;
        assert!(!state.is_enabled());
        assert_eq!(controller.offset(), 3);
    }

    #[tokio::test]
    async fn test_every_message_is_acknowledged() {
        let messenger = Arc::new(MockMessenger::new());
        let state = ReportingState::new();
        let mut controller = controller(&messenger, &state);

        controller.handle_update(InboundUpdate::text(5, 7, "what is this")).await;
        controller
            .handle_update(InboundUpdate {
                update_id: 6,
                message: Some(InboundMessage {
                    chat_id: 7,
                    text: None,
                }),
            })
            .await;
        controller
            .handle_update(InboundUpdate {
                update_id: 7,
                message: None,
            })
            .await;

        assert!(!state.is_enabled());
        let menus = messenger.menus();
        assert_eq!(menus.len(), 2);
        assert!(menus.iter().all(|m| m.chat_id == 7 && m.text == MENU_PROMPT));
        assert_eq!(menus[0].options, vec!["Enable", "Disable"]);
        assert_eq!(controller.offset(), 8);
    }

    #[tokio::test]
    async fn test_ack_failure_keeps_state_change() {
        let messenger = Arc::new(MockMessenger::new());
        messenger.fail_menus(true);
        let state = ReportingState::new();
        let mut controller = controller(&messenger, &state);

        controller.handle_update(InboundUpdate::text(1, 42, "ENABLE")).await;
        assert!(state.is_enabled());
    }

    #[tokio::test]
    async fn test_offset_never_moves_backwards() {
        let messenger = Arc::new(MockMessenger::new());
        let state = ReportingState::new();
        let mut controller = controller(&messenger, &state);

        controller.handle_update(InboundUpdate::text(10, 1, "x")).await;
        controller.handle_update(InboundUpdate::text(4, 1, "y")).await;
        assert_eq!(controller.offset(), 11);
    }

    #[tokio::test]
    async fn test_run_retries_after_poll_failure() {
        let messenger = Arc::new(MockMessenger::new());
        messenger.push_poll_error("network down");
        messenger.push_updates(vec![InboundUpdate::text(3, 42, "enable")]);
        let state = ReportingState::new();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(controller(&messenger, &state).run(cancel.clone()));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !state.is_enabled() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(state.is_enabled());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("controller should stop on cancel")
            .unwrap();

        let offsets = messenger.polled_offsets();
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[1], 0);
        assert!(offsets[2..].iter().all(|offset| *offset == 4));
    }
}
