//! Opaque single-use tokens for email confirmation and password reset.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    EmailConfirmation,
    PasswordReset,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::EmailConfirmation => "email_confirmation",
            TokenKind::PasswordReset => "password_reset",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerificationToken {
    pub token: String,
    pub kind: TokenKind,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new_email_confirmation(user_id: Uuid, token: String) -> Self {
        Self {
            token,
            kind: TokenKind::EmailConfirmation,
            user_id,
            expires_at: Utc::now() + Duration::hours(24),
        }
    }

    pub fn new_password_reset(user_id: Uuid, token: String) -> Self {
        Self {
            token,
            kind: TokenKind::PasswordReset,
            user_id,
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
