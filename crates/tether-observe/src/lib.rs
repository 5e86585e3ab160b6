//! Process-wide logging setup.
//!
//! ```rust,no_run
//! use tether_observe::{LoggerConfig, LoggerFormat, LoggerLevel, init_logger};
//!
//! # fn main() -> Result<(), tether_observe::LoggerError> {
//! let cfg = LoggerConfig {
//!     format: LoggerFormat::Json,
//!     level: LoggerLevel::new("info,tether_discord=debug")?,
//!     ..Default::default()
//! };
//! init_logger(&cfg)?;
//! # Ok(())
//! # }
//! ```

mod logger;
pub use logger::*;
