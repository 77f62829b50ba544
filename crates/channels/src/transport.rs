//! Long-poll pump shared by both channel adapters. A transport yields
//! batches of inbound messages and delivers replies; the poller owns
//! reconnects and keeps one crashed turn from taking the loop down.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use parkbot_core::Channel;

use crate::events::{split_message, InboundMessage, OutboundReply};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport poll failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("message handling failed: {0}")]
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// One messaging platform connection: Telegram `getUpdates` or the VK
/// group long-poll server.
#[async_trait]
pub trait PollTransport: Send + Sync {
    fn channel(&self) -> Channel;
    async fn connect(&self) -> Result<(), TransportError>;
    /// The next batch of updates. `None` means the stream closed cleanly.
    async fn next_batch(&self) -> Result<Option<Vec<InboundMessage>>, TransportError>;
    async fn send(&self, reply: &OutboundReply) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport for disabled channels; connects and immediately closes.
pub struct NoopTransport {
    channel: Channel,
}

impl NoopTransport {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl PollTransport for NoopTransport {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_batch(&self) -> Result<Option<Vec<InboundMessage>>, TransportError> {
        Ok(None)
    }

    async fn send(&self, _reply: &OutboundReply) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Consumes inbound messages and produces reply texts. The server wires
/// this to the agent runtime.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage) -> Result<Vec<String>, HandlerError>;
}

pub struct ChannelPoller {
    transport: Arc<dyn PollTransport>,
    handler: Arc<dyn MessageHandler>,
    reconnect_policy: ReconnectPolicy,
}

impl ChannelPoller {
    pub fn new(
        transport: Arc<dyn PollTransport>,
        handler: Arc<dyn MessageHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, handler, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        let channel = self.transport.channel().as_str();
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        channel,
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "channel transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            channel,
                            max_retries = self.reconnect_policy.max_retries,
                            "channel retries exhausted; giving up on this channel"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        let channel = self.transport.channel().as_str();
        info!(channel, attempt, "opening channel transport connection");
        self.transport.connect().await?;
        info!(channel, attempt, "channel transport connected");

        loop {
            let Some(batch) = self.transport.next_batch().await? else {
                info!(channel, attempt, "channel transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            for message in batch {
                let key = message.identity.key();
                debug!(
                    event_name = "message_received",
                    channel,
                    channel_key = key.as_str(),
                    "inbound message"
                );

                let identity = message.identity.clone();
                let texts = match self.handler.handle(message).await {
                    Ok(texts) => texts,
                    Err(error) => {
                        // One broken turn must not stall the whole channel.
                        warn!(
                            event_name = "message_dropped",
                            channel,
                            channel_key = key.as_str(),
                            error = %error,
                            "message handling failed; continuing poll loop"
                        );
                        continue;
                    }
                };

                for text in texts.iter().flat_map(|t| split_message(t)) {
                    let reply = OutboundReply { identity: identity.clone(), text };
                    if let Err(error) = self.transport.send(&reply).await {
                        warn!(
                            event_name = "reply_send_failed",
                            channel,
                            channel_key = key.as_str(),
                            error = %error,
                            "reply delivery failed"
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parkbot_core::{Channel, ChannelIdentity, ProfileHints};
    use tokio::sync::Mutex;

    use super::{
        ChannelPoller, HandlerError, MessageHandler, PollTransport, ReconnectPolicy,
        TransportError,
    };
    use crate::events::{InboundMessage, OutboundReply};

    fn inbound(user_id: &str, text: &str) -> InboundMessage {
        InboundMessage {
            identity: ChannelIdentity::telegram(user_id),
            text: text.to_string(),
            hints: ProfileHints::default(),
        }
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        batches: VecDeque<Result<Option<Vec<InboundMessage>>, TransportError>>,
        connect_attempts: usize,
        sent: Vec<OutboundReply>,
    }

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            batches: Vec<Result<Option<Vec<InboundMessage>>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    batches: batches.into(),
                    ..Default::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn sent(&self) -> Vec<OutboundReply> {
            self.state.lock().await.sent.clone()
        }
    }

    #[async_trait]
    impl PollTransport for ScriptedTransport {
        fn channel(&self) -> Channel {
            Channel::Telegram
        }

        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_batch(&self) -> Result<Option<Vec<InboundMessage>>, TransportError> {
            let mut state = self.state.lock().await;
            state.batches.pop_front().unwrap_or(Ok(None))
        }

        async fn send(&self, reply: &OutboundReply) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.sent.push(reply.clone());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl MessageHandler for EchoHandler {
        async fn handle(&self, message: InboundMessage) -> Result<Vec<String>, HandlerError> {
            if message.text == "boom" {
                return Err(HandlerError::Failed("scripted failure".into()));
            }
            Ok(vec![format!("echo: {}", message.text)])
        }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".into())), Ok(())],
            vec![Ok(Some(vec![inbound("42", "hello")])), Ok(None)],
        ));

        let poller = ChannelPoller::new(
            transport.clone(),
            Arc::new(EchoHandler),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );
        poller.start().await.expect("poller should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "echo: hello");
    }

    #[tokio::test]
    async fn handler_failure_drops_the_message_but_keeps_the_loop() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(vec![inbound("1", "boom"), inbound("2", "still here")])),
                Ok(None),
            ],
        ));

        let poller = ChannelPoller::new(
            transport.clone(),
            Arc::new(EchoHandler),
            ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
        );
        poller.start().await.expect("poller survives handler errors");

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "echo: still here");
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".into())),
                Err(TransportError::Connect("fail-2".into())),
                Err(TransportError::Connect("fail-3".into())),
            ],
            vec![],
        ));

        let poller = ChannelPoller::new(
            transport.clone(),
            Arc::new(EchoHandler),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );
        poller.start().await.expect("poller degrades gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }
}
