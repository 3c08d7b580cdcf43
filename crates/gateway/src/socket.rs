use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use homecord_core::ApplicationError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, GatewayEnvelope, GatewayEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
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

/// Source of decoded gateway envelopes. `Ok(None)` from `next_envelope` closes the stream.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// What an embedding gateway client pushes into [`ChannelTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngressFrame {
    Envelope(GatewayEnvelope),
    /// The upstream session dropped. The runner treats it as a read failure and reconnects.
    SessionLost(String),
}

impl From<GatewayEnvelope> for IngressFrame {
    fn from(envelope: GatewayEnvelope) -> Self {
        Self::Envelope(envelope)
    }
}

/// In-process transport fed through an mpsc sender. The stream ends once every sender is dropped.
pub struct ChannelTransport {
    receiver: Mutex<mpsc::Receiver<IngressFrame>>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (mpsc::Sender<IngressFrame>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (sender, Self { receiver: Mutex::new(receiver) })
    }
}

#[async_trait]
impl GatewayTransport for ChannelTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        match self.receiver.lock().await.recv().await {
            Some(IngressFrame::Envelope(envelope)) => Ok(Some(envelope)),
            Some(IngressFrame::SessionLost(reason)) => Err(TransportError::Receive(reason)),
            None => Ok(None),
        }
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.receiver.lock().await.close();
        Ok(())
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Pumps envelopes until the transport closes cleanly or reconnects run out.
    /// A session that delivered at least one envelope restores the full retry budget.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            let mut delivered = 0_u64;
            let Err(transport_error) = self.connect_and_pump(attempt, &mut delivered).await else {
                return Ok(());
            };
            if delivered > 0 {
                attempt = 0;
            }

            warn!(
                event_name = "ingress.gateway.transport_failed",
                attempt,
                delivered,
                max_retries = self.reconnect_policy.max_retries,
                error = %transport_error,
                "gateway transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    event_name = "ingress.gateway.retries_exhausted",
                    max_retries = self.reconnect_policy.max_retries,
                    "gateway retries exhausted; continuing process without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        delivered: &mut u64,
    ) -> Result<(), TransportError> {
        info!(event_name = "ingress.gateway.connecting", attempt, "opening gateway connection");
        self.transport.connect().await?;
        info!(event_name = "ingress.gateway.connected", attempt, "gateway connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(event_name = "ingress.gateway.closed", attempt, "gateway stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            *delivered += 1;
            let (guild_id, content_id) = correlation_fields(&envelope);

            debug!(
                event_name = "ingress.gateway.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = envelope.event.event_type().as_str(),
                correlation_id = %envelope.envelope_id,
                guild_id = guild_id.as_deref().unwrap_or("unknown"),
                content_id = content_id.as_deref().unwrap_or("unknown"),
                "received gateway envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.gateway.ack_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge gateway envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            if let Err(error) = self.dispatcher.dispatch(&envelope, &context).await {
                let error = ApplicationError::from(error);
                warn!(
                    event_name = "ingress.gateway.dispatch_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    guild_id = guild_id.as_deref().unwrap_or("unknown"),
                    content_id = content_id.as_deref().unwrap_or("unknown"),
                    error_kind = error.kind(),
                    error = %error,
                    "event dispatch failed; continuing gateway loop"
                );
            }
        }
    }
}

fn correlation_fields(envelope: &GatewayEnvelope) -> (Option<String>, Option<String>) {
    let guild_id = envelope.event.guild_id().map(|id| id.0.clone());
    let content_id = match &envelope.event {
        GatewayEvent::MessageCreate(event) => Some(event.message.id.0.clone()),
        GatewayEvent::ReactionAdd(event) => Some(event.message_id.0.clone()),
        GatewayEvent::FeatureMessageCommand(event) => Some(event.message_id.0.clone()),
        GatewayEvent::FeatureMessageSubmit(event) => Some(event.message_id.0.clone()),
        GatewayEvent::MessageDelete { message_id } => Some(message_id.0.clone()),
        GatewayEvent::ScheduledEventUserAdd { event_id, .. }
        | GatewayEvent::ScheduledEventDelete { event_id }
        | GatewayEvent::ScheduledEventUpdate { event_id, .. } => Some(event_id.0.clone()),
        GatewayEvent::ThreadDelete { thread_id } | GatewayEvent::ThreadUpdate { thread_id, .. } => {
            Some(thread_id.0.clone())
        }
        GatewayEvent::ChannelDelete { channel_id, .. } => Some(channel_id.0.clone()),
        GatewayEvent::MessageDeleteBulk { .. }
        | GatewayEvent::RoleDelete { .. }
        | GatewayEvent::GuildCreate { .. }
        | GatewayEvent::GuildDelete { .. }
        | GatewayEvent::Unsupported { .. } => None,
    };
    (guild_id, content_id)
}
