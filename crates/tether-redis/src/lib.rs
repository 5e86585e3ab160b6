//! Redis pub/sub coordination backend.
//!
//! Every subscription opens its own pub/sub connection; publishes share one
//! multiplexed connection per [`RedisChannel`], opened lazily on first use.

mod config;
pub use config::{RedisConfig, RedisConfigError};

mod channel;
pub use channel::RedisChannel;
