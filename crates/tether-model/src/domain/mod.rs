mod listener_config;
pub use listener_config::{
    DEFAULT_DURATION_MS, DEFAULT_GRACE_MS, ListenerConfig, MAX_DURATION_MS, parse_duration_hint,
};

mod listener_id;
pub use listener_id::ListenerId;

mod listener_state;
pub use listener_state::ListenerState;

mod run_result;
pub use run_result::{GatewayRunResult, RunStatus};

mod session_info;
pub use session_info::SessionInfo;

/// Duration value in milliseconds.
pub type DurationMs = u64;
