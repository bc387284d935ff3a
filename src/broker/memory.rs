use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{error::RelayError, Result};

use super::{BrokerChannel, Delivery, DeliveryStream, DeliveryTag, PublishProperties, Topology};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub queue: String,
    pub payload: Vec<u8>,
    pub properties: PublishProperties,
}

impl PublishedMessage {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Default)]
struct State {
    declared: Vec<Topology>,
    prefetch: Option<u16>,
    queues: HashMap<String, VecDeque<(Vec<u8>, bool)>>,
    unacked: HashMap<DeliveryTag, (String, Vec<u8>)>,
    settled: HashSet<DeliveryTag>,
    next_tag: DeliveryTag,
    max_unacked: usize,
    published: Vec<PublishedMessage>,
    acked: Vec<DeliveryTag>,
    rejected: Vec<(DeliveryTag, bool)>,
    cancelled: bool,
    closed: bool,
    fail_publishes: bool,
}

/// In-process broker with AMQP-like delivery semantics: the prefetch ceiling
/// holds back deliveries while too many are unacknowledged, and rejecting with
/// requeue puts the body back at the head of its queue.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a message body on `queue`, as a producer would.
    pub fn push(&self, queue: &str, body: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back((body.into(), false));
        self.notify.notify_waiters();
    }

    /// Ends every open consumer stream, like a broker-side consumer cancel.
    pub fn cancel_consumers(&self) {
        self.state.lock().cancelled = true;
        self.notify.notify_waiters();
    }

    /// Allows new consumers after [`MemoryBroker::cancel_consumers`].
    pub fn resume_consumers(&self) {
        self.state.lock().cancelled = false;
    }

    /// Makes every publish fail until switched off again.
    pub fn fail_publishes(&self, fail: bool) {
        self.state.lock().fail_publishes = fail;
    }

    pub fn declared(&self) -> Vec<Topology> {
        self.state.lock().declared.clone()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().published.clone()
    }

    pub fn acked(&self) -> Vec<DeliveryTag> {
        self.state.lock().acked.clone()
    }

    pub fn rejected(&self) -> Vec<(DeliveryTag, bool)> {
        self.state.lock().rejected.clone()
    }

    pub fn unacked(&self) -> usize {
        self.state.lock().unacked.len()
    }

    /// Highest number of simultaneously unacknowledged deliveries seen so far.
    pub fn max_unacked(&self) -> usize {
        self.state.lock().max_unacked
    }

    pub fn pending(&self, queue: &str) -> usize {
        self.state.lock().queues.get(queue).map_or(0, VecDeque::len)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn settle(&self, tag: DeliveryTag) -> Result<(String, Vec<u8>)> {
        let mut state = self.state.lock();
        if !state.settled.insert(tag) {
            return Err(RelayError::Broker(format!("delivery tag {tag} settled twice")));
        }
        state
            .unacked
            .remove(&tag)
            .ok_or_else(|| RelayError::Broker(format!("unknown delivery tag {tag}")))
    }

    /// Next delivery for `queue`, or `None` once consumers are cancelled.
    async fn next_delivery(&self, queue: &str) -> Option<Delivery> {
        loop {
            let notified = self.notify.notified();
            {
                let mut guard = self.state.lock();
                let state = &mut *guard;
                if state.cancelled || state.closed {
                    return None;
                }
                let ceiling = state.prefetch.map_or(usize::MAX, usize::from);
                let next = if state.unacked.len() < ceiling {
                    state.queues.get_mut(queue).and_then(VecDeque::pop_front)
                } else {
                    None
                };
                if let Some((body, redelivered)) = next {
                    state.next_tag += 1;
                    let tag = state.next_tag;
                    state.unacked.insert(tag, (queue.to_string(), body.clone()));
                    state.max_unacked = state.max_unacked.max(state.unacked.len());
                    return Some(Delivery { tag, body, redelivered });
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl BrokerChannel for MemoryBroker {
    async fn declare_topology(&self, topology: &Topology) -> Result<()> {
        let mut state = self.state.lock();
        state.queues.entry(topology.queue.clone()).or_default();
        state.prefetch = Some(topology.prefetch);
        state.declared.push(topology.clone());
        Ok(())
    }

    async fn consume(&self, queue: &str, _consumer_tag: &str) -> Result<DeliveryStream> {
        if self.state.lock().closed {
            return Err(RelayError::Broker("channel closed".to_string()));
        }

        let broker = self.clone();
        let queue = queue.to_string();
        let stream = futures::stream::unfold((broker, queue), |(broker, queue)| async move {
            let delivery = broker.next_delivery(&queue).await?;
            Some((Ok(delivery), (broker, queue)))
        });
        Ok(stream.boxed())
    }

    async fn publish(&self, queue: &str, payload: &[u8], properties: &PublishProperties) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RelayError::Broker("channel closed".to_string()));
        }
        if state.fail_publishes {
            return Err(RelayError::Broker(format!("publish to {queue} refused")));
        }
        state.published.push(PublishedMessage {
            queue: queue.to_string(),
            payload: payload.to_vec(),
            properties: properties.clone(),
        });
        Ok(())
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<()> {
        self.settle(tag)?;
        self.state.lock().acked.push(tag);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<()> {
        let (queue, body) = self.settle(tag)?;
        {
            let mut state = self.state.lock();
            state.rejected.push((tag, requeue));
            if requeue {
                state.queues.entry(queue).or_default().push_front((body, true));
            }
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.closed = true;
            // unacknowledged deliveries go back to their queues, as on connection loss
            for (_, (queue, body)) in state.unacked.drain() {
                state.queues.entry(queue).or_default().push_front((body, true));
            }
        }
        self.notify.notify_waiters();
        Ok(())
    }
}
