//! Telegram Bot API adapter: `getUpdates` long-poll in, `sendMessage` out.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use parkbot_core::Channel;

use crate::events::{parse_telegram_update, InboundMessage, OutboundReply};
use crate::transport::{PollTransport, TransportError};

const POLL_WAIT_SECS: u64 = 25;

pub struct TelegramTransport {
    http: reqwest::Client,
    bot_token: SecretString,
    /// Next `getUpdates` offset; `None` until the first batch arrives.
    offset: Mutex<Option<i64>>,
}

impl TelegramTransport {
    pub fn new(bot_token: SecretString) -> Self {
        Self { http: reqwest::Client::new(), bot_token, offset: Mutex::new(None) }
    }

    fn method_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token.expose_secret())
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportError::Receive(err.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|err| TransportError::Receive(err.to_string()))?;

        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = payload
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(TransportError::Receive(format!("{method} rejected: {description}")));
        }
        Ok(payload["result"].clone())
    }
}

#[async_trait]
impl PollTransport for TelegramTransport {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let me = self
            .call("getMe", json!({}))
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        tracing::info!(
            event_name = "telegram_connected",
            bot = me.get("username").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            "telegram bot authorized"
        );
        Ok(())
    }

    async fn next_batch(&self) -> Result<Option<Vec<InboundMessage>>, TransportError> {
        let mut offset = self.offset.lock().await;
        let mut body = json!({
            "timeout": POLL_WAIT_SECS,
            "allowed_updates": ["message"],
        });
        if let Some(next) = *offset {
            body["offset"] = json!(next);
        }

        let result = self.call("getUpdates", body).await?;
        let updates = result.as_array().cloned().unwrap_or_default();

        let mut batch = Vec::new();
        for update in &updates {
            if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
                *offset = Some(offset.map_or(update_id + 1, |o| o.max(update_id + 1)));
            }
            if let Some(inbound) = parse_telegram_update(update) {
                batch.push(inbound);
            }
        }
        Ok(Some(batch))
    }

    async fn send(&self, reply: &OutboundReply) -> Result<(), TransportError> {
        let chat_id: i64 = reply
            .identity
            .user_id
            .parse()
            .map_err(|_| TransportError::Send(format!("bad chat id `{}`", reply.identity.user_id)))?;

        self.call("sendMessage", json!({"chat_id": chat_id, "text": reply.text}))
            .await
            .map_err(|err| TransportError::Send(err.to_string()))?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
