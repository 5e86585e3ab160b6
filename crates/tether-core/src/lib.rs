pub mod error;
pub use error::{CoordinationError, CoreError, RunError};

pub mod signal;
pub use signal::CancellationSignal;

pub mod coordination;
pub use coordination::{CoordinationChannel, MemoryChannel, Subscription};

pub mod connector;
pub use connector::{PlatformConnector, RunContext};

pub mod metrics;
pub use metrics::{MetricsBackend, MetricsHandle, NoopMetrics};

pub mod tasks;
pub use tasks::BackgroundTasks;

pub mod state;
pub use state::SessionRegistry;

pub mod session;
pub use session::{ListenerSession, SideChannelExit};

pub mod listener;
pub use listener::{ABORTED, FAILURE_TAG, ListenerOutcome, OutcomeBody, PersistentListener};

mod system;
pub use system::{init_uptime, instance_id, uptime_seconds};
