//! Signing key for the token codec.

use std::fmt;

use rand::RngCore;

/// Shared secret used to sign and verify tokens. Injected into the codec at
/// construction time and owned by process startup — never a hidden global.
#[derive(Clone)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl SigningKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Generate a random 32-byte key for deployments without a configured
    /// secret. Tokens signed with a generated key do not survive restarts.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_leaks_key_material() {
        let key = SigningKey::new(b"super-secret".to_vec());
        let out = format!("{key:?}");
        assert!(!out.contains("super-secret"));
        assert!(out.contains("REDACTED"));
    }

    #[test]
    fn generated_keys_differ() {
        let a = SigningKey::generate();
        let b = SigningKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.as_bytes().len(), 32);
    }
}
