//! OAuth2 state tokens.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::codec::{Token, TokenClaims, TokenCodec, TokenError};
use crate::provider::AuthProviderId;

/// How long a login attempt stays valid before the provider must redirect
/// back.
const STATE_VALIDITY_HOURS: i64 = 1;

/// The OAuth2 `state` value: encoded into the authorization link and handed
/// back by the provider on callback.
///
/// Created per login attempt and single-use in intent, though the format
/// keeps no server-side revocation list — replay inside the short expiry
/// window is an accepted risk. Carries enough for the callback handler to
/// know where to send the browser and which providers were legal when the
/// link was generated.
///
/// <https://tools.ietf.org/html/draft-bradley-oauth-jwt-encoded-state-05>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    #[serde(flatten)]
    pub token: Token,
    /// Whether login should also register the tenant.
    pub register: bool,
    /// Path to redirect to after the login callback.
    #[serde(rename = "modulePath")]
    pub module_path: String,
    #[serde(rename = "authProviders")]
    pub auth_providers: Vec<AuthProviderId>,
}

impl AuthState {
    pub fn new(
        tenant_id: i64,
        module_path: impl Into<String>,
        auth_providers: Vec<AuthProviderId>,
    ) -> Self {
        Self {
            token: Token::new(tenant_id, Duration::hours(STATE_VALIDITY_HOURS)),
            register: false,
            module_path: module_path.into(),
            auth_providers,
        }
    }

    pub fn with_register(mut self, register: bool) -> Self {
        self.register = register;
        self
    }

    /// Serialize, sign, and base64-encode for use as a URL query value.
    pub fn encode(&self, codec: &TokenCodec) -> Result<String, TokenError> {
        codec.encode_string(self)
    }

    /// Decode a state string with optional expiry and signature validation.
    pub fn decode(codec: &TokenCodec, state: &str, validate: bool) -> Result<Self, TokenError> {
        codec.decode_string(state, validate)
    }

    pub fn allows_provider(&self, provider: AuthProviderId) -> bool {
        self.auth_providers.contains(&provider)
    }
}

impl TokenClaims for AuthState {
    fn base(&self) -> &Token {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SigningKey;

    fn codec() -> TokenCodec {
        TokenCodec::new(SigningKey::new(b"state-test-key".to_vec()))
    }

    #[test]
    fn state_roundtrip() {
        let codec = codec();
        let state = AuthState::new(
            123,
            "ModulePath",
            vec![AuthProviderId::Amazon, AuthProviderId::GitHub],
        );

        let encoded = state.encode(&codec).unwrap();
        let decoded = AuthState::decode(&codec, &encoded, true).unwrap();

        assert_eq!(decoded.token.tenant_id, 123);
        assert_eq!(decoded.module_path, "ModulePath");
        assert!(!decoded.register);
        assert!(decoded.allows_provider(AuthProviderId::Amazon));
        assert!(decoded.allows_provider(AuthProviderId::GitHub));
        assert!(!decoded.allows_provider(AuthProviderId::Google));
    }

    #[test]
    fn register_flag_survives_roundtrip() {
        let codec = codec();
        let state = AuthState::new(1, "/setup", vec![AuthProviderId::Google]).with_register(true);
        let decoded = AuthState::decode(&codec, &state.encode(&codec).unwrap(), true).unwrap();
        assert!(decoded.register);
    }

    #[test]
    fn provider_order_preserved() {
        let codec = codec();
        let providers = vec![
            AuthProviderId::Yahoo,
            AuthProviderId::Amazon,
            AuthProviderId::Slack,
        ];
        let state = AuthState::new(4, "/m", providers.clone());
        let decoded = AuthState::decode(&codec, &state.encode(&codec).unwrap(), true).unwrap();
        assert_eq!(decoded.auth_providers, providers);
    }

    #[test]
    fn tampered_state_rejected() {
        let codec = codec();
        let state = AuthState::new(123, "/m", vec![AuthProviderId::GitHub]);
        let mut encoded = state.encode(&codec).unwrap();
        // Swap a character in the middle of the base64 body.
        let mid = encoded.len() / 2;
        let swapped = if encoded.as_bytes()[mid] == b'A' { "B" } else { "A" };
        encoded.replace_range(mid..mid + 1, swapped);

        assert!(AuthState::decode(&codec, &encoded, true).is_err());
    }
}
