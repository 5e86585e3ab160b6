//! Discord Gateway connection for the persistent listener.
//!
//! [`DiscordConnector`] opens the Gateway WebSocket, identifies with the bot
//! token, keeps the heartbeat going and re-delivers every dispatch event as
//! an HTTP POST to the forwarding URL. It reconnects on its own while the
//! run budget lasts and stops as soon as the session's signal fires.

mod config;
pub use config::{DEFAULT_GATEWAY_URL, DiscordConfig};

mod error;
pub use error::GatewayError;

pub mod protocol;

mod forward;
pub use forward::{EventForwarder, ForwardStats, ForwardedEvent, GATEWAY_TOKEN_HEADER};

mod gateway;
pub use gateway::GatewayClient;

mod connector;
pub use connector::DiscordConnector;
