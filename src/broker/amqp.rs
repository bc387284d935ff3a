use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        BasicRejectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};

use crate::{error::RelayError, Result};

use super::{BrokerChannel, Delivery, DeliveryStream, DeliveryTag, PublishProperties, Topology};

const DELIVERY_MODE_TRANSIENT: u8 = 1;
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// One AMQP 0-9-1 connection with a single channel, shared by every delivery.
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
}

impl AmqpBroker {
    /// Opens the connection and its channel. There is no retry here, a broker
    /// that cannot be reached at startup is fatal to the worker.
    pub async fn connect(uri: &str) -> Result<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;

        tracing::info!(channel_id = channel.id(), "broker connected");
        Ok(Self { connection, channel })
    }
}

#[async_trait]
impl BrokerChannel for AmqpBroker {
    async fn declare_topology(&self, topology: &Topology) -> Result<()> {
        self.channel
            .exchange_declare(
                &topology.exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        self.channel
            .queue_declare(
                &topology.queue,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        self.channel
            .queue_bind(
                &topology.queue,
                &topology.exchange,
                &topology.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        self.channel
            .basic_qos(topology.prefetch, BasicQosOptions::default())
            .await?;

        tracing::info!(
            exchange = %topology.exchange,
            queue = %topology.queue,
            prefetch = topology.prefetch,
            "topology declared"
        );
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream> {
        let consumer = self
            .channel
            .basic_consume(queue, consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
            .await?;

        let deliveries = consumer.map(|delivery| {
            delivery
                .map(|d| Delivery {
                    tag: d.delivery_tag,
                    body: d.data,
                    redelivered: d.redelivered,
                })
                .map_err(RelayError::from)
        });
        Ok(deliveries.boxed())
    }

    async fn publish(&self, queue: &str, payload: &[u8], properties: &PublishProperties) -> Result<()> {
        let delivery_mode = if properties.persistent {
            DELIVERY_MODE_PERSISTENT
        } else {
            DELIVERY_MODE_TRANSIENT
        };
        let props = BasicProperties::default()
            .with_content_type(properties.content_type.clone().into())
            .with_delivery_mode(delivery_mode);

        self.channel
            .basic_publish("", queue, BasicPublishOptions::default(), payload, props)
            .await?;
        Ok(())
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<()> {
        self.channel.basic_ack(tag, BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<()> {
        self.channel
            .basic_reject(tag, BasicRejectOptions { requeue })
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.connection.close(200, "Shut down").await?;
        tracing::info!("broker connection closed");
        Ok(())
    }
}
