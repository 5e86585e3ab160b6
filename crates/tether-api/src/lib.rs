//! HTTP surface of the persistent listener.
//!
//! Routes:
//! - `GET /api/{platform}/gateway` - scheduler trigger; runs one listener session
//! - `GET /api/listeners` - session registry snapshot
//! - `GET /healthz` - liveness

mod auth;

mod config;
pub use config::{BYPASS_QUERY_PARAM, DeploymentConfig, GatewayEndpointConfig};

mod error;
pub use error::ApiError;

mod http;
pub use http::GatewayApi;

pub use axum;
