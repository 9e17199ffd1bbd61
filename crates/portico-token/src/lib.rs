//! Signed tokens for Portico.
//!
//! A simplified take on JWT: the header segment is omitted since the hash
//! algorithm and payload shape never change per deployment. Payloads are
//! signed with HMAC-SHA256 — the same key signs and verifies, so tokens can
//! only be validated by a process holding the shared secret.
//!
//! A token cannot be modified without failing verification. Its contents are
//! not private, but they are guaranteed unmodified as long as the key is
//! secure. Key rotation is not supported by the format; rotating the key
//! invalidates every outstanding token.
//!
//! Two payload shapes build on the generic codec:
//! - [`AuthState`] carries one-time OAuth login state (1 hour).
//! - [`AuthorizationToken`] carries the post-login permission set (24 hours).

pub mod authorization;
pub mod codec;
pub mod key;
pub mod provider;
pub mod state;

pub use authorization::AuthorizationToken;
pub use codec::{Token, TokenClaims, TokenCodec, TokenError};
pub use key::SigningKey;
pub use provider::AuthProviderId;
pub use state::AuthState;
