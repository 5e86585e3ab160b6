//! Gateway wire format (API v10, JSON encoding).

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod op {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const GUILD_MESSAGE_REACTIONS: u64 = 1 << 10;
    pub const DIRECT_MESSAGES: u64 = 1 << 12;
    pub const DIRECT_MESSAGE_REACTIONS: u64 = 1 << 13;
    pub const MESSAGE_CONTENT: u64 = 1 << 15;

    pub const DEFAULT: u64 = GUILDS
        | GUILD_MESSAGES
        | GUILD_MESSAGE_REACTIONS
        | DIRECT_MESSAGES
        | DIRECT_MESSAGE_REACTIONS
        | MESSAGE_CONTENT;
}

pub mod close_codes {
    pub const AUTHENTICATION_FAILED: u16 = 4004;
    pub const INVALID_SHARD: u16 = 4010;
    pub const SHARDING_REQUIRED: u16 = 4011;
    pub const INVALID_API_VERSION: u16 = 4012;
    pub const INVALID_INTENTS: u16 = 4013;
    pub const DISALLOWED_INTENTS: u16 = 4014;
}

/// Close codes after which reconnecting cannot succeed.
pub fn is_fatal_close(code: u16) -> bool {
    use close_codes::*;
    matches!(
        code,
        AUTHENTICATION_FAILED
            | INVALID_SHARD
            | SHARDING_REQUIRED
            | INVALID_API_VERSION
            | INVALID_INTENTS
            | DISALLOWED_INTENTS
    )
}

/// Any frame received from the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct Outgoing<T> {
    pub op: u8,
    pub d: T,
}

#[derive(Debug, Serialize)]
pub struct Identify<'a> {
    pub token: &'a str,
    pub intents: u64,
    pub properties: ConnectionProperties,
}

#[derive(Debug, Serialize)]
pub struct ConnectionProperties {
    pub os: &'static str,
    pub browser: &'static str,
    pub device: &'static str,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS,
            browser: "tether",
            device: "tether",
        }
    }
}

pub fn heartbeat(seq: Option<u64>) -> Outgoing<Option<u64>> {
    Outgoing {
        op: op::HEARTBEAT,
        d: seq,
    }
}

pub fn identify(token: &str, intents: u64) -> Outgoing<Identify<'_>> {
    Outgoing {
        op: op::IDENTIFY,
        d: Identify {
            token,
            intents,
            properties: ConnectionProperties::default(),
        },
    }
}
