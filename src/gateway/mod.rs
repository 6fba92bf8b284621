//! Gateway for jobpilot
//!
//! Owns the service lifecycle: channel adapter, per-user event lanes, the
//! daily digest loop and the optional HTTP control API.

mod handler;
pub(crate) mod server;

pub use handler::ApiHandler;
pub use server::{Gateway, GatewayBuilder, GatewayState, GatewayStatus, LastDigest};
