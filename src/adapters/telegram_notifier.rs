//! Telegram Bot API notifier.

use crate::domain::error::PriceGateError;
use crate::ports::notifier::Notifier;
use reqwest::blocking::Client;
use serde_json::json;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramNotifier {
    client: Client,
    // contains the bot token; never log it
    send_url: String,
    chat_id: String,
    attempts: u32,
    backoff: Duration,
}

impl TelegramNotifier {
    pub fn new(
        api_base: &str,
        bot_token: &str,
        chat_id: impl Into<String>,
        retries: u32,
    ) -> Result<Self, PriceGateError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PriceGateError::ConfigInvalid {
                section: "notify".to_string(),
                key: "kind".to_string(),
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            send_url: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            chat_id: chat_id.into(),
            attempts: retries.max(1),
            backoff: Duration::from_secs(2),
        })
    }

    /// Base delay between attempts; attempt `n` waits `n * backoff`.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn try_send(&self, message: &str) -> Result<(), String> {
        let body = json!({ "chat_id": self.chat_id, "text": message });
        let resp = self
            .client
            .post(&self.send_url)
            .json(&body)
            .send()
            .map_err(|e| e.without_url().to_string())?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("HTTP {status}"))
        }
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, message: &str) -> bool {
        for attempt in 1..=self.attempts {
            match self.try_send(message) {
                Ok(()) => {
                    debug!(attempt, "notification delivered");
                    return true;
                }
                Err(reason) => {
                    warn!(attempt, attempts = self.attempts, %reason, "notification attempt failed");
                    if attempt < self.attempts {
                        thread::sleep(self.backoff * attempt);
                    }
                }
            }
        }
        error!(attempts = self.attempts, "giving up on notification");
        false
    }
}
