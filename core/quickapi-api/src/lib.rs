//! Transports for QuickAPI entities.
//!
//! Both adapters translate caller input into storage requests and nothing
//! more: scope activation goes through [`quickapi_model::create_hooks`],
//! preloads through the entity's preload source, and failures are mapped to
//! status codes by [`status_for`].
//!
//! - [`http::router`] mounts REST routes per entity (axum)
//! - [`rpc::RpcRouter`] answers `<prefix>.<name>.<action>` topics

mod config;
pub mod http;
mod params;
mod problem;
pub mod rpc;

pub use config::HttpConfig;
pub use params::Params;
pub use problem::{status_for, ApiError, Problem};
