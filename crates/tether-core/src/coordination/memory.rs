use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{trace, warn};

use super::{CoordinationChannel, Subscription};
use crate::error::CoordinationError;

const DEFAULT_CAPACITY: usize = 64;

/// Process-local coordination channel.
///
/// Clones share the same set of channels, so every session holding a clone
/// sees every other session's announcements. Publishers receive their own
/// messages, like Redis does.
#[derive(Clone)]
pub struct MemoryChannel {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
    capacity: usize,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Number of open subscriptions on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationChannel for MemoryChannel {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), CoordinationError> {
        // Err only means nobody is listening.
        let delivered = self.sender(channel).send(message.to_string()).unwrap_or(0);
        trace!(channel, delivered, "published");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, CoordinationError> {
        let rx = self.sender(channel).subscribe();
        Ok(Box::new(MemorySubscription {
            channel: channel.to_string(),
            rx: Some(rx),
        }))
    }
}

struct MemorySubscription {
    channel: String,
    rx: Option<broadcast::Receiver<String>>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_message(&mut self) -> Option<String> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(msg) => return Some(msg),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "subscription lagged; messages dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    async fn unsubscribe(&mut self) -> Result<(), CoordinationError> {
        self.rx = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let ch = MemoryChannel::new();
        assert!(ch.publish("empty", "hello").await.is_ok());
    }

    #[tokio::test]
    async fn every_subscriber_receives_including_publisher() {
        let ch = MemoryChannel::new();
        let mut a = ch.subscribe("c").await.unwrap();
        let mut b = ch.subscribe("c").await.unwrap();
        assert_eq!(ch.subscriber_count("c"), 2);

        ch.publish("c", "id-1").await.unwrap();

        assert_eq!(a.next_message().await.as_deref(), Some("id-1"));
        assert_eq!(b.next_message().await.as_deref(), Some("id-1"));
    }

    #[tokio::test]
    async fn channels_are_isolated_by_name() {
        let ch = MemoryChannel::new();
        let mut a = ch.subscribe("a").await.unwrap();
        ch.publish("b", "x").await.unwrap();

        let got = tokio::time::timeout(Duration::from_millis(50), a.next_message()).await;
        assert!(got.is_err(), "message leaked across channels");
    }

    #[tokio::test]
    async fn unsubscribe_releases_the_receiver() {
        let ch = MemoryChannel::new();
        let mut a = ch.subscribe("c").await.unwrap();
        assert_eq!(ch.subscriber_count("c"), 1);

        a.unsubscribe().await.unwrap();
        assert_eq!(ch.subscriber_count("c"), 0);
        assert!(a.next_message().await.is_none());
    }

    #[tokio::test]
    async fn clones_share_channels() {
        let ch = MemoryChannel::new();
        let other = ch.clone();
        let mut sub = ch.subscribe("c").await.unwrap();
        other.publish("c", "from-clone").await.unwrap();
        assert_eq!(sub.next_message().await.as_deref(), Some("from-clone"));
    }
}
