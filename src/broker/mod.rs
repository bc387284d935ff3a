//! Message broker seam. The relay only talks to a [`BrokerChannel`]; the AMQP
//! implementation lives in [`amqp`], an in-process one for tests in `memory`
//! (behind the `test-util` feature).

pub mod amqp;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{config::BrokerConfig, Result};

pub use amqp::AmqpBroker;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryBroker;

pub type DeliveryTag = u64;

/// Stream of deliveries for one consumer. It ends when the broker cancels the
/// consumer or the channel closes.
pub type DeliveryStream = BoxStream<'static, Result<Delivery>>;

#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub body: Vec<u8>,
    pub redelivered: bool,
}

/// Exchange, queue and binding the consumer reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    pub queue: String,
    /// Empty for the default binding on a direct exchange
    pub routing_key: String,
    pub prefetch: u16,
}

impl From<&BrokerConfig> for Topology {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            exchange: config.exchange.clone(),
            queue: config.queue.clone(),
            routing_key: String::new(),
            prefetch: config.prefetch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishProperties {
    pub content_type: String,
    pub persistent: bool,
}

impl PublishProperties {
    /// Non-persistent JSON, the properties of every response envelope.
    pub fn transient_json() -> Self {
        Self {
            content_type: "application/json".to_string(),
            persistent: false,
        }
    }
}

#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declares the durable direct exchange and queue, binds them and applies
    /// the prefetch ceiling. Safe to repeat.
    async fn declare_topology(&self, topology: &Topology) -> Result<()>;

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream>;

    /// Publishes `payload` straight to `queue` through the default exchange.
    async fn publish(&self, queue: &str, payload: &[u8], properties: &PublishProperties) -> Result<()>;

    async fn ack(&self, tag: DeliveryTag) -> Result<()>;

    async fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
