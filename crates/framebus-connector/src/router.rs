//! Per-topic fan-out of inbound packets.
//!
//! A topic may have any number of receivers. Each receiver sees every
//! packet published on its topic after it subscribed, in arrival order.
//! There is no replay: packets published before a receiver existed are
//! not delivered to it.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::trace;

use framebus_core::Packet;

/// Stream of inbound packets for one topic.
///
/// Yields `None` once the owning connector is closed.
#[derive(Debug)]
pub struct TopicReceiver {
    topic: String,
    rx: mpsc::UnboundedReceiver<Packet>,
}

impl TopicReceiver {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next packet on this topic.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.rx.recv().await
    }

    /// Returns a packet if one is already queued.
    pub fn try_recv(&mut self) -> Option<Packet> {
        self.rx.try_recv().ok()
    }
}

/// Routes packets to the receivers subscribed to their topic.
#[derive(Debug, Default)]
pub struct TopicRouter {
    topics: HashMap<String, Vec<mpsc::UnboundedSender<Packet>>>,
    closed: bool,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new receiver for `topic`.
    ///
    /// After [`close`](Self::close) the receiver is returned already ended.
    pub fn subscribe(&mut self, topic: impl Into<String>) -> TopicReceiver {
        let topic = topic.into();
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.closed {
            self.topics.entry(topic.clone()).or_default().push(tx);
        }
        TopicReceiver { topic, rx }
    }

    /// Hands `packet` to every live receiver of its topic.
    ///
    /// Receivers that were dropped are pruned. Returns how many receivers
    /// got the packet.
    pub fn publish(&mut self, packet: &Packet) -> usize {
        let Some(senders) = self.topics.get_mut(&packet.topic) else {
            trace!(topic = %packet.topic, "No receivers for topic");
            return 0;
        };

        senders.retain(|tx| tx.send(packet.clone()).is_ok());
        let delivered = senders.len();
        if delivered == 0 {
            self.topics.remove(&packet.topic);
        }
        delivered
    }

    /// Number of live receivers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Ends every receiver. Later subscriptions end immediately.
    pub fn close(&mut self) {
        self.closed = true;
        self.topics.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
