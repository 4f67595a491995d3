use serde::{Deserialize, Serialize};

use crate::models::IdentityClaim;

/// Desired full role set for a target identity; the engine computes the
/// symmetric difference against the current set.
#[derive(Debug, Deserialize, Serialize)]
pub struct SyncRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SyncClaimsRequest {
    pub claims: Vec<IdentityClaim>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RolesResponse {
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimsResponse {
    pub claims: Vec<IdentityClaim>,
}
