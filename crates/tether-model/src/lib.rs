//! Plain data types shared by the tether crates.
//!
//! Nothing in here performs I/O: these are the configuration, identity and
//! outcome types that flow between the coordinator, the coordination
//! backends and the HTTP surface.

mod domain;
pub use domain::*;

mod error;
pub use error::ModelError;
