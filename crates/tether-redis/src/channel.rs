use std::pin::pin;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection, aio::PubSub};
use tether_core::{CoordinationChannel, CoordinationError, Subscription};
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

use crate::config::RedisConfig;

/// [`CoordinationChannel`] backed by Redis pub/sub.
pub struct RedisChannel {
    client: Client,
    publisher: OnceCell<MultiplexedConnection>,
}

impl RedisChannel {
    /// Build the client. No connection is made until the first publish or subscribe.
    pub fn open(config: &RedisConfig) -> Result<Self, CoordinationError> {
        config
            .validate()
            .map_err(|e| CoordinationError::Connect(e.to_string()))?;
        let client = Client::open(config.url.as_str())
            .map_err(|e| CoordinationError::Connect(e.to_string()))?;

        debug!(url = %config.redacted_url(), "redis coordination configured");
        Ok(Self {
            client,
            publisher: OnceCell::new(),
        })
    }

    async fn publisher(&self) -> Result<MultiplexedConnection, CoordinationError> {
        let conn = self
            .publisher
            .get_or_try_init(|| async {
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| CoordinationError::Connect(e.to_string()))
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl CoordinationChannel for RedisChannel {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), CoordinationError> {
        let mut conn = self.publisher().await?;
        let receivers: i64 = conn
            .publish(channel, message)
            .await
            .map_err(|e| CoordinationError::Publish {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;
        trace!(channel, receivers, "published");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, CoordinationError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| CoordinationError::Connect(e.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| CoordinationError::Subscribe {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(RedisSubscription {
            channel: channel.to_string(),
            pubsub: Some(pubsub),
        }))
    }
}

struct RedisSubscription {
    channel: String,
    pubsub: Option<PubSub>,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn next_message(&mut self) -> Option<String> {
        let pubsub = self.pubsub.as_mut()?;
        let mut messages = pin!(pubsub.on_message());
        loop {
            let msg = messages.next().await?;
            match msg.get_payload::<String>() {
                Ok(payload) => return Some(payload),
                Err(e) => warn!(channel = %self.channel, error = %e, "non-text payload skipped"),
            }
        }
    }

    async fn unsubscribe(&mut self) -> Result<(), CoordinationError> {
        let Some(mut pubsub) = self.pubsub.take() else {
            return Ok(());
        };
        pubsub
            .unsubscribe(self.channel.as_str())
            .await
            .map_err(|e| CoordinationError::Unsubscribe {
                channel: self.channel.clone(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tether_model::ListenerConfig;

    use super::*;

    #[test]
    fn open_rejects_bad_url_without_connecting() {
        let err = RedisChannel::open(&RedisConfig::new("http://nope")).err();
        assert!(matches!(err, Some(CoordinationError::Connect(_))));
    }

    #[tokio::test]
    async fn unreachable_server_surfaces_connect_error() {
        // Port 1 is reserved and never serves redis.
        let ch = RedisChannel::open(&RedisConfig::new("redis://127.0.0.1:1")).unwrap();

        let sub = tokio::time::timeout(Duration::from_secs(5), ch.subscribe("c"))
            .await
            .expect("connect should fail fast");
        assert!(matches!(sub.err(), Some(CoordinationError::Connect(_))));

        let publish = ch.publish("c", "x").await;
        assert!(matches!(publish, Err(CoordinationError::Connect(_))));
    }

    fn live() -> RedisChannel {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        RedisChannel::open(&RedisConfig::new(url)).unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a running redis"]
    async fn live_publish_reaches_subscriber() {
        let ch = live();
        let name = ListenerConfig::new("redis-live-test").channel_name();
        let mut sub = ch.subscribe(&name).await.unwrap();

        ch.publish(&name, "id-1").await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(2), sub.next_message())
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("id-1"));
        sub.unsubscribe().await.unwrap();
        assert!(sub.next_message().await.is_none());
    }
}
