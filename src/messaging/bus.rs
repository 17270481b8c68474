//! # Message Bus Client
//!
//! Producer and consumer contracts for the durable visibility topic, plus an
//! in-process bus used in single-node deployments and by the test suites.
//!
//! Delivery is at-least-once: a message stays owned by the bus until the
//! consumer acks it, and a nack puts it back at the end of the partition.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::error::MessagingError;
use crate::messaging::message::VisibilityMessage;

/// Producer half of the visibility topic.
#[async_trait]
pub trait VisibilityProducer: Send + Sync {
    /// Publish a message. At-least-once: callers may observe duplicates
    /// downstream and must de-dupe by document id plus message type.
    async fn publish(&self, msg: &VisibilityMessage) -> Result<(), MessagingError>;
}

/// A message leased from the bus. Dropping without ack leaves the message
/// eligible for redelivery.
pub trait BusMessage: Send + Sync {
    fn value(&self) -> &[u8];
    /// Mark the message durably handled.
    fn ack(self: Box<Self>);
    /// Return the message to the partition for redelivery.
    fn nack(self: Box<Self>);
}

/// Consumer half of one partition of the visibility topic.
#[async_trait]
pub trait VisibilityConsumer: Send {
    /// Next message, or `None` once the partition is closed.
    async fn next(&mut self) -> Option<Box<dyn BusMessage>>;
}

/// Delivery counters for the in-memory bus, used by tests and health checks.
#[derive(Debug, Default)]
pub struct BusStats {
    published: AtomicU64,
    acked: AtomicU64,
    redelivered: AtomicU64,
}

impl BusStats {
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::Relaxed)
    }

    pub fn redelivered(&self) -> u64 {
        self.redelivered.load(Ordering::Relaxed)
    }
}

/// Single-partition in-process bus.
pub struct InMemoryBus;

impl InMemoryBus {
    /// Create a connected producer/consumer pair with shared stats.
    pub fn channel() -> (InMemoryProducer, InMemoryConsumer, Arc<BusStats>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(BusStats::default());
        let producer = InMemoryProducer {
            tx: tx.clone(),
            stats: stats.clone(),
        };
        let consumer = InMemoryConsumer {
            rx: Mutex::new(rx),
            redeliver: tx,
            stats: stats.clone(),
        };
        (producer, consumer, stats)
    }
}

#[derive(Clone)]
pub struct InMemoryProducer {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    stats: Arc<BusStats>,
}

impl InMemoryProducer {
    /// Publish raw bytes, bypassing the schema. Exists so downstream
    /// decode-failure handling can be exercised.
    pub fn publish_raw(&self, bytes: Vec<u8>) {
        if self.tx.send(bytes).is_ok() {
            self.stats.published.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl VisibilityProducer for InMemoryProducer {
    async fn publish(&self, msg: &VisibilityMessage) -> Result<(), MessagingError> {
        let bytes = msg.encode()?;
        self.tx.send(bytes).map_err(|_| MessagingError::Closed)?;
        self.stats.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

pub struct InMemoryConsumer {
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    redeliver: mpsc::UnboundedSender<Vec<u8>>,
    stats: Arc<BusStats>,
}

#[async_trait]
impl VisibilityConsumer for InMemoryConsumer {
    async fn next(&mut self) -> Option<Box<dyn BusMessage>> {
        let payload = self.rx.lock().await.recv().await?;
        Some(Box::new(InMemoryMessage {
            payload,
            redeliver: self.redeliver.clone(),
            stats: self.stats.clone(),
        }))
    }
}

struct InMemoryMessage {
    payload: Vec<u8>,
    redeliver: mpsc::UnboundedSender<Vec<u8>>,
    stats: Arc<BusStats>,
}

impl BusMessage for InMemoryMessage {
    fn value(&self) -> &[u8] {
        &self.payload
    }

    fn ack(self: Box<Self>) {
        self.stats.acked.fetch_add(1, Ordering::Relaxed);
    }

    fn nack(self: Box<Self>) {
        self.stats.redelivered.fetch_add(1, Ordering::Relaxed);
        if self.redeliver.send(self.payload).is_err() {
            debug!("nack after bus shutdown, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_consume_then_ack() {
        let (producer, mut consumer, stats) = InMemoryBus::channel();
        let msg = VisibilityMessage::open("d1", "wf1", "run1", "OrderWorkflow", 1);
        producer.publish(&msg).await.unwrap();

        let delivered = consumer.next().await.unwrap();
        let decoded = VisibilityMessage::decode(delivered.value()).unwrap();
        assert_eq!(decoded, msg);

        delivered.ack();
        assert_eq!(stats.published(), 1);
        assert_eq!(stats.acked(), 1);
        assert_eq!(stats.redelivered(), 0);
    }

    #[tokio::test]
    async fn nack_redelivers_the_message() {
        let (producer, mut consumer, stats) = InMemoryBus::channel();
        let msg = VisibilityMessage::delete("d1", "wf1", "run1");
        producer.publish(&msg).await.unwrap();

        let first = consumer.next().await.unwrap();
        first.nack();

        let second = consumer.next().await.unwrap();
        assert_eq!(VisibilityMessage::decode(second.value()).unwrap(), msg);
        second.ack();

        assert_eq!(stats.redelivered(), 1);
        assert_eq!(stats.acked(), 1);
    }
}
