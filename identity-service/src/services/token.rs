//! Token issuer.
//!
//! Turns a resolved identity plus role set into a signed, time-bounded
//! bearer token. Tokens are stateless: once issued they are never mutated,
//! only expire. Signing uses a single shared HS256 secret whose presence is
//! enforced at startup, so issuance itself has no expected failure mode.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::Identity;

/// Literal marker for "this identity belongs to no company".
pub const COMPANY_NONE: &str = "none";

/// Claim set carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (identity id)
    pub sub: String,
    /// Per-token unique id, for audit trails
    pub jti: String,
    pub email: String,
    /// Display name, falling back to the username
    pub name: String,
    /// One entry per held role
    pub roles: Vec<String>,
    /// "yes" / "no"
    pub is_company_owner: String,
    /// Company UUID string, or the literal "none"
    pub company_id: String,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Caller-supplied extra claims, flattened into the payload
    #[serde(flatten, default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl AccessClaims {
    pub fn subject_id(&self) -> Option<Uuid> {
        self.sub.parse().ok()
    }

    /// Parse the company claim; `None` for the absence marker or malformed
    /// values (the latter is the resolver's defensive-fallback trigger).
    pub fn company(&self) -> Option<Uuid> {
        if self.company_id == COMPANY_NONE {
            return None;
        }
        self.company_id.parse().ok()
    }

    pub fn owns_company(&self) -> bool {
        self.is_company_owner == "yes"
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_minutes: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, expiry_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_minutes,
        }
    }

    /// Issue a token for an identity holding `roles`.
    pub fn issue(
        &self,
        identity: &Identity,
        roles: &[String],
        extra: HashMap<String, String>,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.expiry_minutes);

        let claims = AccessClaims {
            sub: identity.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            email: identity.email.clone(),
            name: identity
                .display_name
                .clone()
                .unwrap_or_else(|| identity.username.clone()),
            roles: roles.to_vec(),
            is_company_owner: if identity.is_company_owner { "yes" } else { "no" }.to_string(),
            company_id: identity
                .company_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| COMPANY_NONE.to_string()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            extra,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;
        Ok(token)
    }

    pub fn decode(&self, token: &str) -> Result<AccessClaims, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let data = decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid access token: {}", e))?;
        Ok(data.claims)
    }

    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_minutes * 60
    }
}
