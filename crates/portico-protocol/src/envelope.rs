//! Request/response envelopes exchanged over the WebSocket channel.
//!
//! Inbound wire form:  `{ "type": <int>, "id": <string>, "data": <raw JSON> }`
//! Outbound wire form: `{ "status": <int>, "id": <string>, "data": <any|null> }`
//!
//! `id` is opaque client-chosen correlation data and is echoed back verbatim
//! on every path, including errors, so the client can match asynchronous
//! responses to originating calls.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::status::ServiceStatus;

/// Identifies the service operation a request should be routed to.
pub type ServiceId = i32;

/// Inbound envelope as sent by the browser. The payload is kept raw so the
/// matched endpoint can deserialize it into its registered concrete type.
#[derive(Debug, Deserialize)]
pub struct RawRequest {
    #[serde(rename = "type")]
    pub service_id: ServiceId,
    #[serde(rename = "id", default)]
    pub request_id: String,
    #[serde(rename = "data", default)]
    pub payload: Option<Box<RawValue>>,
}

/// Outbound envelope sent to the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "status")]
    pub status_id: ServiceStatus,
    #[serde(rename = "id")]
    pub request_id: String,
    #[serde(rename = "data")]
    pub payload: Option<serde_json::Value>,
}

impl Response {
    /// An okay response carrying `payload`. If the payload cannot be
    /// represented as JSON the response degrades to the marshal-failure
    /// envelope immediately, before it ever reaches the wire.
    pub fn success<T: Serialize>(payload: T) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => Self {
                status_id: ServiceStatus::Okay,
                request_id: String::new(),
                payload: Some(value),
            },
            Err(_) => Self::error(ServiceStatus::UnableToMarshalResponse),
        }
    }

    /// A response with an error status and no payload.
    pub fn error(status: ServiceStatus) -> Self {
        Self {
            status_id: status,
            request_id: String::new(),
            payload: None,
        }
    }

    /// Serialize to the JSON byte form sent to the browser.
    ///
    /// If serialization fails the entire response is replaced with a minimal
    /// `{ status: UnableToMarshalResponse, id, data: null }` envelope built
    /// from primitive fields only, so this path always yields bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            Err(_) => {
                let fallback = Self {
                    status_id: ServiceStatus::UnableToMarshalResponse,
                    request_id: self.request_id.clone(),
                    payload: None,
                };
                // Only primitive fields remain, cannot fail.
                serde_json::to_vec(&fallback).unwrap_or_default()
            }
        }
    }
}
