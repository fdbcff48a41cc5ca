use super::{InboundMessage, InboundUpdate, Messenger};
use crate::config::ReportConfig;
use crate::error::MessengerError;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// Slack added to the long-poll timeout before the HTTP request gives up
const POLL_GRACE: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bot API envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T, MessengerError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(MessengerError::Api {
                method: method.to_string(),
                description: "response has no result".to_string(),
            }),
            (false, _) => Err(MessengerError::Api {
                method: method.to_string(),
                description: self
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    username: Option<String>,
    first_name: String,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl From<Update> for InboundUpdate {
    fn from(update: Update) -> Self {
        Self {
            update_id: update.update_id,
            message: update.message.map(|message| InboundMessage {
                chat_id: message.chat.id,
                text: message.text,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct KeyboardButton<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ReplyKeyboardMarkup<'a> {
    keyboard: Vec<Vec<KeyboardButton<'a>>>,
    resize_keyboard: bool,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    reply_markup: ReplyKeyboardMarkup<'a>,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

fn menu_request<'a>(chat_id: i64, text: &'a str, options: &[&'a str]) -> SendMessage<'a> {
    SendMessage {
        chat_id,
        text,
        reply_markup: ReplyKeyboardMarkup {
            keyboard: options
                .iter()
                .map(|option| vec![KeyboardButton { text: *option }])
                .collect(),
            resize_keyboard: true,
        },
    }
}

/// Telegram Bot API client
pub struct TelegramMessenger {
    client: Client,
    api_url: String,
    token: String,
}

impl TelegramMessenger {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, MessengerError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(MessengerError::MissingToken);
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(redact)?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    pub fn from_config(config: &ReportConfig) -> Result<Self, MessengerError> {
        let token = config.credential().ok_or(MessengerError::MissingToken)?;
        Self::new(config.api_url.clone(), token)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        method: &str,
    ) -> Result<T, MessengerError> {
        // Error replies still carry the JSON envelope, so status is not checked here
        let envelope: ApiResponse<T> = response.json().await.map_err(redact)?;
        envelope.into_result(method)
    }

    async fn call_json<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, MessengerError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        trace!("Calling {}", method);
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(redact)?;

        Self::decode(response, method).await
    }
}

/// The token is part of every URL; keep it out of error text
fn redact(error: reqwest::Error) -> MessengerError {
    MessengerError::Http(error.without_url())
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn verify(&self) -> Result<String, MessengerError> {
        let user: User = self
            .call_json("getMe", &serde_json::json!({}), REQUEST_TIMEOUT)
            .await?;
        Ok(user.username.unwrap_or(user.first_name))
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: Vec<u8>,
        file_name: &str,
    ) -> Result<(), MessengerError> {
        let size = photo.len();
        let part = Part::bytes(photo)
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")
            .map_err(redact)?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(redact)?;

        let _: serde_json::Value = Self::decode(response, "sendPhoto").await?;
        debug!("Sent photo {} ({} bytes) to chat {}", file_name, size, chat_id);
        Ok(())
    }

    async fn poll_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<InboundUpdate>, MessengerError> {
        let request = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: ["message"],
        };

        let updates: Vec<Update> = self
            .call_json("getUpdates", &request, timeout.saturating_add(POLL_GRACE))
            .await?;
        Ok(updates.into_iter().map(InboundUpdate::from).collect())
    }

    async fn send_menu(
        &self,
        chat_id: i64,
        text: &str,
        options: &[&str],
    ) -> Result<(), MessengerError> {
        let request = menu_request(chat_id, text, options);
        let _: serde_json::Value = self
            .call_json("sendMessage", &request, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }
}
