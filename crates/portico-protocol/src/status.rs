//! Service status codes returned with every response envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A numeric status code outside the known vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown service status code {0}")]
pub struct UnknownStatus(pub i32);

/// Outcome of one dispatched service call. These are response-carried
/// statuses, not transport errors — every completed dispatch yields exactly
/// one well-formed envelope tagged with one of these.
///
/// Numeric values are fixed wire constants consumed by the browser client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Okay,
    IncompatiblePayload,
    EmptyPayload,
    UnableToParseRequest,
    InvalidService,
    UnableToMarshalResponse,
    NotImplemented,
    DatabaseError,
    LdapError,
    NoWebSocketClient,
    NoMatchingRecords,
}

impl ServiceStatus {
    pub fn code(&self) -> i32 {
        match self {
            Self::Okay => 0,
            Self::IncompatiblePayload => 1,
            Self::EmptyPayload => 2,
            Self::UnableToParseRequest => 3,
            Self::InvalidService => 4,
            Self::UnableToMarshalResponse => 5,
            Self::NotImplemented => 6,
            Self::DatabaseError => 7,
            Self::LdapError => 8,
            Self::NoWebSocketClient => 9,
            Self::NoMatchingRecords => 10,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::try_from(code).ok()
    }
}

impl TryFrom<i32> for ServiceStatus {
    type Error = UnknownStatus;

    fn try_from(code: i32) -> Result<Self, UnknownStatus> {
        let status = match code {
            0 => Self::Okay,
            1 => Self::IncompatiblePayload,
            2 => Self::EmptyPayload,
            3 => Self::UnableToParseRequest,
            4 => Self::InvalidService,
            5 => Self::UnableToMarshalResponse,
            6 => Self::NotImplemented,
            7 => Self::DatabaseError,
            8 => Self::LdapError,
            9 => Self::NoWebSocketClient,
            10 => Self::NoMatchingRecords,
            other => return Err(UnknownStatus(other)),
        };
        Ok(status)
    }
}

impl Serialize for ServiceStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for ServiceStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        Self::try_from(code).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(ServiceStatus::Okay.code(), 0);
        assert_eq!(ServiceStatus::IncompatiblePayload.code(), 1);
        assert_eq!(ServiceStatus::UnableToParseRequest.code(), 3);
        assert_eq!(ServiceStatus::InvalidService.code(), 4);
        assert_eq!(ServiceStatus::UnableToMarshalResponse.code(), 5);
        assert_eq!(ServiceStatus::NoMatchingRecords.code(), 10);
    }

    #[test]
    fn status_roundtrip() {
        for code in 0..=10 {
            let status = ServiceStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert!(ServiceStatus::from_code(11).is_none());
        assert!(ServiceStatus::from_code(-1).is_none());
    }

    #[test]
    fn status_serializes_as_number() {
        let json = serde_json::to_value(ServiceStatus::InvalidService).unwrap();
        assert_eq!(json, serde_json::json!(4));
    }

    #[test]
    fn unknown_code_is_an_error() {
        let err = ServiceStatus::try_from(42).unwrap_err();
        assert_eq!(err, UnknownStatus(42));
        assert_eq!(err.to_string(), "unknown service status code 42");

        let parsed: Result<ServiceStatus, _> = serde_json::from_str("42");
        assert!(parsed.is_err());
    }
}
