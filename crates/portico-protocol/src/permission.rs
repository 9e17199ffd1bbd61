//! Permission identifiers checked against an authorization token.

use serde::{Deserialize, Serialize};

/// A single permission. Authorization tokens carry the numeric values;
/// endpoints declare the permissions a caller must hold.
///
/// Values are fixed wire constants — modules define their own in disjoint
/// ranges and never renumber them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(pub u16);

impl Permission {
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl From<u16> for Permission {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "permission:{}", self.0)
    }
}
