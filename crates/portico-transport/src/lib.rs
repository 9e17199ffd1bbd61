//! Portico transport layer.
//!
//! Owns the lifecycle of all live client connections:
//! - HTTP to WebSocket upgrade and authorization-token extraction
//! - per-connection inbound and outbound pumps
//! - a single-owner coordination loop serializing membership, inbound
//!   routing, and broadcast fan-out
//!
//! Delivery to one connection never blocks delivery to, or processing of,
//! another: slow service calls run on their own tasks and slow clients are
//! shed when their bounded outbound queue overflows.

pub mod hub;
pub mod server;

pub use hub::{ConnectionId, Hub};
pub use server::{TransportConfig, TransportError, TransportServer};
