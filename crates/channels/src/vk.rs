//! VK community adapter: Bots Long Poll in, `messages.send` out.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::Mutex;

use parkbot_core::Channel;

use crate::events::{parse_vk_update, InboundMessage, OutboundReply};
use crate::transport::{PollTransport, TransportError};

const API_VERSION: &str = "5.199";
const POLL_WAIT_SECS: u64 = 25;

#[derive(Clone, Debug)]
struct LongPollSession {
    server: String,
    key: String,
    ts: String,
}

/// What one long-poll response asks the client to do next.
#[derive(Debug, PartialEq, Eq)]
enum PollOutcome {
    /// New updates; carry on from the returned cursor.
    Updates(Vec<Value>, String),
    /// Cursor fell behind (`failed: 1`); resume from the returned cursor.
    Resync(String),
    /// Key or server expired (`failed: 2` or `3`); a fresh session is needed.
    Expired,
}

// The server reports `ts` as a string or a number depending on version.
fn ts_field(body: &Value) -> Option<String> {
    match body.get("ts")? {
        Value::String(ts) => Some(ts.clone()),
        Value::Number(ts) => Some(ts.to_string()),
        _ => None,
    }
}

fn interpret_poll(body: &Value, current_ts: &str) -> Result<PollOutcome, TransportError> {
    match body.get("failed").and_then(Value::as_i64) {
        None => {
            let ts = ts_field(body).unwrap_or_else(|| current_ts.to_string());
            let updates = body.get("updates").and_then(Value::as_array).cloned().unwrap_or_default();
            Ok(PollOutcome::Updates(updates, ts))
        }
        Some(1) => {
            let ts = ts_field(body)
                .ok_or_else(|| TransportError::Receive("failed=1 without ts".into()))?;
            Ok(PollOutcome::Resync(ts))
        }
        Some(2) | Some(3) => Ok(PollOutcome::Expired),
        Some(code) => Err(TransportError::Receive(format!("long poll failed with code {code}"))),
    }
}

pub struct VkTransport {
    http: reqwest::Client,
    access_token: SecretString,
    group_id: i64,
    session: Mutex<Option<LongPollSession>>,
}

impl VkTransport {
    pub fn new(access_token: SecretString, group_id: i64) -> Self {
        Self { http: reqwest::Client::new(), access_token, group_id, session: Mutex::new(None) }
    }

    async fn method(&self, name: &str, params: &[(&str, String)]) -> Result<Value, TransportError> {
        let mut query: Vec<(&str, String)> = vec![
            ("access_token", self.access_token.expose_secret().to_string()),
            ("v", API_VERSION.to_string()),
        ];
        query.extend(params.iter().cloned());

        let payload: Value = self
            .http
            .post(format!("https://api.vk.com/method/{name}"))
            .form(&query)
            .send()
            .await
            .map_err(|err| TransportError::Receive(err.to_string()))?
            .json()
            .await
            .map_err(|err| TransportError::Receive(err.to_string()))?;

        if let Some(error) = payload.get("error") {
            let message = error
                .get("error_msg")
                .and_then(Value::as_str)
                .unwrap_or("no message");
            return Err(TransportError::Receive(format!("{name} rejected: {message}")));
        }
        Ok(payload["response"].clone())
    }

    async fn open_session(&self) -> Result<LongPollSession, TransportError> {
        let response = self
            .method("groups.getLongPollServer", &[("group_id", self.group_id.to_string())])
            .await?;

        let field = |key: &str| {
            response
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| TransportError::Connect(format!("long poll server missing `{key}`")))
        };
        Ok(LongPollSession { server: field("server")?, key: field("key")?, ts: field("ts")? })
    }
}

fn random_id() -> i64 {
    // VK deduplicates sends by (peer, random_id); nanosecond time is unique
    // enough for one process.
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos() as i64).unwrap_or(0)
        ^ SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[async_trait]
impl PollTransport for VkTransport {
    fn channel(&self) -> Channel {
        Channel::Vk
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let session = self.open_session().await?;
        tracing::info!(
            event_name = "vk_connected",
            group_id = self.group_id,
            "vk long poll session opened"
        );
        *self.session.lock().await = Some(session);
        Ok(())
    }

    async fn next_batch(&self) -> Result<Option<Vec<InboundMessage>>, TransportError> {
        let mut guard = self.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| TransportError::Receive("long poll session not open".into()))?;

        let url = format!(
            "{}?act=a_check&key={}&ts={}&wait={POLL_WAIT_SECS}",
            session.server, session.key, session.ts
        );
        let body: Value = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| TransportError::Receive(err.to_string()))?
            .json()
            .await
            .map_err(|err| TransportError::Receive(err.to_string()))?;

        match interpret_poll(&body, &session.ts)? {
            PollOutcome::Updates(updates, ts) => {
                session.ts = ts;
                Ok(Some(updates.iter().filter_map(parse_vk_update).collect()))
            }
            PollOutcome::Resync(ts) => {
                session.ts = ts;
                Ok(Some(Vec::new()))
            }
            PollOutcome::Expired => {
                *guard = None;
                Err(TransportError::Receive("long poll session expired".into()))
            }
        }
    }

    async fn send(&self, reply: &OutboundReply) -> Result<(), TransportError> {
        self.method(
            "messages.send",
            &[
                ("user_id", reply.identity.user_id.clone()),
                ("random_id", random_id().to_string()),
                ("message", reply.text.clone()),
            ],
        )
        .await
        .map_err(|err| match err {
            TransportError::Receive(msg) => TransportError::Send(msg),
            other => other,
        })?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        *self.session.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{interpret_poll, PollOutcome};
    use crate::transport::TransportError;

    #[test]
    fn successful_poll_advances_the_cursor() {
        let body = json!({"ts": "101", "updates": [{"type": "message_new"}]});
        match interpret_poll(&body, "100").expect("ok") {
            PollOutcome::Updates(updates, ts) => {
                assert_eq!(updates.len(), 1);
                assert_eq!(ts, "101");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn failed_one_resyncs_from_the_returned_cursor() {
        let body = json!({"failed": 1, "ts": "205"});
        assert_eq!(interpret_poll(&body, "200").expect("ok"), PollOutcome::Resync("205".into()));
    }

    #[test]
    fn expired_key_or_server_forces_a_new_session() {
        assert_eq!(interpret_poll(&json!({"failed": 2}), "1").expect("ok"), PollOutcome::Expired);
        assert_eq!(interpret_poll(&json!({"failed": 3}), "1").expect("ok"), PollOutcome::Expired);
    }

    #[test]
    fn unknown_failure_codes_are_errors() {
        assert!(matches!(
            interpret_poll(&json!({"failed": 9}), "1"),
            Err(TransportError::Receive(_))
        ));
    }
}
