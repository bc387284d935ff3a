//! The consume → resolve → publish → ack loop.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{
    broker::{AmqpBroker, BrokerChannel, Delivery, PublishProperties, Topology},
    config::{BrokerConfig, NormalizedConfig},
    types::MalformedPolicy,
    upstream::{Resolve, UpstreamResolver},
    InboundEnvelope, OutboundEnvelope, Result,
};

/// Why [`Relay::subscribe`] stopped consuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// The broker ended the consumer stream (consumer cancel or channel loss).
    Cancelled,
    /// The shutdown token fired. In-flight deliveries were left unacknowledged.
    Shutdown,
}

/// What happened to a single delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// A response envelope was published and the delivery acknowledged.
    Published(OutboundEnvelope),
    /// Empty body, acknowledged silently.
    Discarded,
    /// Unparseable body, acknowledged without a response.
    Dropped,
    /// Unparseable body, rejected without requeue.
    DeadLettered,
}

/// Process-scoped relay context: one broker channel, one resolver, shared by
/// every delivery for the lifetime of the worker.
pub struct Relay {
    config: BrokerConfig,
    channel: Arc<dyn BrokerChannel>,
    resolver: Arc<dyn Resolve>,
    consumer_tag: String,
}

impl Relay {
    pub fn new(config: BrokerConfig, channel: Arc<dyn BrokerChannel>, resolver: Arc<dyn Resolve>) -> Self {
        let consumer_tag = format!("{}-{}", config.queue, std::process::id());
        Self {
            config,
            channel,
            resolver,
            consumer_tag,
        }
    }

    /// Opens the single AMQP connection and builds the upstream resolver.
    pub async fn connect(config: &NormalizedConfig) -> Result<Self> {
        let resolver = UpstreamResolver::new(config.upstream.clone())?;
        let broker = AmqpBroker::connect(&config.broker.uri).await?;

        Ok(Self::new(config.broker.clone(), Arc::new(broker), Arc::new(resolver)))
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Declares the topology, registers the consumer and handles deliveries
    /// until the broker cancels the consumer or `shutdown` fires.
    ///
    /// At most `prefetch` deliveries are processed at once; the broker holds
    /// back the rest until earlier ones are acknowledged.
    pub async fn subscribe(&self, shutdown: CancellationToken) -> Result<Consumption> {
        let topology = Topology::from(&self.config);
        self.channel.declare_topology(&topology).await?;

        let deliveries = self
            .channel
            .consume(&self.config.queue, &self.consumer_tag)
            .await?;
        tracing::info!(queue = %self.config.queue, consumer_tag = %self.consumer_tag, "consuming");

        let limit = usize::from(self.config.prefetch);
        let consuming = deliveries.for_each_concurrent(limit, |delivery| async move {
            match delivery {
                Ok(delivery) => {
                    let tag = delivery.tag;
                    if let Err(e) = self.handle_delivery(delivery).await {
                        tracing::error!(delivery_tag = tag, error = %e, "failed to settle delivery");
                    }
                }
                Err(e) => tracing::error!(error = %e, "consumer error"),
            }
        });

        tokio::select! {
            _ = consuming => {
                tracing::warn!(queue = %self.config.queue, "consumer cancelled by broker");
                Ok(Consumption::Cancelled)
            }
            _ = shutdown.cancelled() => {
                tracing::info!(queue = %self.config.queue, "stopped consuming");
                Ok(Consumption::Shutdown)
            }
        }
    }

    /// Runs one delivery to completion. The response envelope is published
    /// before the delivery is acknowledged; upstream failures still ack. A
    /// delivery whose response cannot be published is requeued.
    pub async fn handle_delivery(&self, delivery: Delivery) -> Result<Disposition> {
        if delivery.body.is_empty() {
            tracing::debug!(delivery_tag = delivery.tag, "discarding empty delivery");
            self.channel.ack(delivery.tag).await?;
            return Ok(Disposition::Discarded);
        }

        let inbound: InboundEnvelope = match serde_json::from_slice(&delivery.body) {
            Ok(inbound) => inbound,
            Err(e) => return self.discard_malformed(&delivery, e).await,
        };

        tracing::info!(
            tx_hash = %inbound.tx_hash,
            msg_type = %inbound.data.msg_type,
            delivery_tag = delivery.tag,
            redelivered = delivery.redelivered,
            "consume from queue"
        );

        let envelope = self.envelope_for(&inbound).await;
        let payload = serde_json::to_vec(&envelope)?;

        let published = self
            .channel
            .publish(&self.config.response_queue, &payload, &PublishProperties::transient_json())
            .await;
        if let Err(e) = published {
            // hand the delivery back so it does not hold a prefetch slot
            tracing::error!(tx_hash = %inbound.tx_hash, delivery_tag = delivery.tag, error = %e, "failed to publish response");
            self.channel.reject(delivery.tag, true).await?;
            return Err(e);
        }
        self.channel.ack(delivery.tag).await?;

        Ok(Disposition::Published(envelope))
    }

    /// Resolves the request and wraps the outcome for the response queue.
    pub async fn envelope_for(&self, inbound: &InboundEnvelope) -> OutboundEnvelope {
        match self.resolver.resolve(&inbound.data).await {
            Ok(result) => {
                tracing::info!(tx_hash = %inbound.tx_hash, "return blockchain response message");
                OutboundEnvelope::success(&inbound.data.msg_type, inbound.tx_hash.clone(), result)
            }
            Err(e) => {
                tracing::warn!(tx_hash = %inbound.tx_hash, error = %e, "return error response message");
                OutboundEnvelope::error(inbound.tx_hash.clone(), e.reason())
            }
        }
    }

    async fn discard_malformed(&self, delivery: &Delivery, err: serde_json::Error) -> Result<Disposition> {
        tracing::warn!(
            delivery_tag = delivery.tag,
            bytes = delivery.body.len(),
            policy = ?self.config.malformed_policy,
            error = %err,
            "malformed message"
        );

        match self.config.malformed_policy {
            MalformedPolicy::Drop => {
                self.channel.ack(delivery.tag).await?;
                Ok(Disposition::Dropped)
            }
            MalformedPolicy::DeadLetter => {
                self.channel.reject(delivery.tag, false).await?;
                Ok(Disposition::DeadLettered)
            }
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.channel.close().await
    }
}
