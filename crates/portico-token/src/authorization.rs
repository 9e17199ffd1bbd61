//! Post-login authorization tokens.

use chrono::Duration;
use portico_protocol::Permission;
use serde::{Deserialize, Serialize};

use crate::codec::{Token, TokenClaims, TokenCodec, TokenError};

/// How long a successful login stays valid.
const AUTHORIZATION_VALIDITY_HOURS: i64 = 24;

/// The credential a client presents on service calls after login: tenant
/// identity plus the permission set granted at login time.
///
/// Duplicate permissions are permitted and preserved — deduplication, if
/// wanted, is a caller concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationToken {
    #[serde(flatten)]
    pub token: Token,
    pub permissions: Vec<u16>,
}

impl AuthorizationToken {
    pub fn new(tenant_id: i64, permissions: Vec<u16>) -> Self {
        Self {
            token: Token::new(tenant_id, Duration::hours(AUTHORIZATION_VALIDITY_HOURS)),
            permissions,
        }
    }

    pub fn encode(&self, codec: &TokenCodec) -> Result<Vec<u8>, TokenError> {
        codec.encode(self)
    }

    /// String form for cookie transport.
    pub fn encode_string(&self, codec: &TokenCodec) -> Result<String, TokenError> {
        codec.encode_string(self)
    }

    pub fn decode(codec: &TokenCodec, frame: &[u8], validate: bool) -> Result<Self, TokenError> {
        codec.decode(frame, validate)
    }

    pub fn decode_string(
        codec: &TokenCodec,
        token: &str,
        validate: bool,
    ) -> Result<Self, TokenError> {
        codec.decode_string(token, validate)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission.value())
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_expired()
    }
}

impl TokenClaims for AuthorizationToken {
    fn base(&self) -> &Token {
        &self.token
    }
}
