//! Portico wire protocol types.
//!
//! This crate is the single source of truth for the request/response
//! envelopes exchanged over the WebSocket channel, the closed set of
//! service status codes, and the permission identifiers carried by
//! authorization tokens.

pub mod envelope;
pub mod permission;
pub mod status;

pub use envelope::{RawRequest, Response, ServiceId};
pub use permission::Permission;
pub use status::{ServiceStatus, UnknownStatus};
