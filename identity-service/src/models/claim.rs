//! Fine-grained permission claims attached to identities.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An arbitrary `(type, value)` pair attached to an identity, used for
/// permissions beyond role membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct IdentityClaim {
    pub claim_type: String,
    pub claim_value: String,
}

impl IdentityClaim {
    pub fn new(claim_type: impl Into<String>, claim_value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            claim_value: claim_value.into(),
        }
    }
}
