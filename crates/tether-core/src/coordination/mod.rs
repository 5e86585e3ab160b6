//! Cross-instance coordination channel.
//!
//! A coordination channel is a best-effort broadcast medium: a message published
//! on a channel name reaches every subscription currently open on that name, and
//! nobody else. There is no durability and no delivery guarantee for
//! subscribers that are not connected at publish time.
//!
//! Implementations:
//! - [`MemoryChannel`]: process-local, backed by `tokio::sync::broadcast`.
//! - `tether-redis`: Redis pub/sub, shared across processes.

mod memory;
pub use memory::MemoryChannel;

use async_trait::async_trait;

use crate::error::CoordinationError;

/// Publish/subscribe backend used by listener sessions.
///
/// A subscription holds its own connection for as long as it is open, so
/// publishing and subscribing never share a connection.
#[async_trait]
pub trait CoordinationChannel: Send + Sync + 'static {
    /// Backend name for logs.
    fn backend(&self) -> &'static str;

    /// Fire-and-forget broadcast. Succeeds with zero subscribers.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), CoordinationError>;

    /// Open a subscription. Messages published after this returns are observed.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, CoordinationError>;
}

/// An open subscription on one channel.
#[async_trait]
pub trait Subscription: Send {
    /// Next message, or `None` once the subscription is closed.
    ///
    /// Must be cancel-safe: dropping the future before it resolves loses nothing.
    async fn next_message(&mut self) -> Option<String>;

    /// Release the subscription and its connection.
    async fn unsubscribe(&mut self) -> Result<(), CoordinationError>;
}
