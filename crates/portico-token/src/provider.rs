//! OAuth provider identifiers.

use serde::{Deserialize, Serialize};

/// Identifies an OAuth2 provider inside an [`AuthState`](crate::AuthState).
///
/// Values are hardcoded wire constants rather than derived ordinals so they
/// can never drift between releases. Provider registration and redirect
/// construction live outside this crate — only the identifiers travel in
/// tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthProviderId {
    None,
    Ldap,
    Amazon,
    Dropbox,
    Facebook,
    GitHub,
    Google,
    Microsoft,
    PayPal,
    Slack,
    Twitter,
    Yahoo,
}

impl AuthProviderId {
    pub fn code(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::Ldap => 10,
            Self::Amazon => 20,
            Self::Dropbox => 30,
            Self::Facebook => 40,
            Self::GitHub => 50,
            Self::Google => 60,
            Self::Microsoft => 70,
            Self::PayPal => 80,
            Self::Slack => 90,
            Self::Twitter => 100,
            Self::Yahoo => 110,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            10 => Some(Self::Ldap),
            20 => Some(Self::Amazon),
            30 => Some(Self::Dropbox),
            40 => Some(Self::Facebook),
            50 => Some(Self::GitHub),
            60 => Some(Self::Google),
            70 => Some(Self::Microsoft),
            80 => Some(Self::PayPal),
            90 => Some(Self::Slack),
            100 => Some(Self::Twitter),
            110 => Some(Self::Yahoo),
            _ => None,
        }
    }
}

impl Serialize for AuthProviderId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

impl<'de> Deserialize<'de> for AuthProviderId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u16::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown auth provider {code}")))
    }
}
