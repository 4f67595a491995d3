use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::services::account::{AuthSession, LoginOutcome};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Successful login payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginSuccessResponse {
    pub succeeded: bool,
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub message: String,
    pub roles: Vec<String>,
}

impl From<AuthSession> for LoginSuccessResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            succeeded: true,
            token: session.token,
            user_id: session.user_id,
            username: session.username,
            email: session.email,
            message: "login successful".to_string(),
            roles: session.roles,
        }
    }
}

/// Failed login payload. Every terminal outcome maps onto this shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginFailureResponse {
    pub succeeded: bool,
    pub errors: Vec<String>,
    pub is_locked_out: bool,
    pub is_not_allowed: bool,
    pub requires_two_factor: bool,
}

impl LoginFailureResponse {
    pub fn from_outcome(outcome: &LoginOutcome) -> Self {
        let (errors, locked, not_allowed, two_factor) = match outcome {
            LoginOutcome::LockedOut => (
                vec!["account is temporarily locked".to_string()],
                true,
                false,
                false,
            ),
            LoginOutcome::NotAllowed => (
                vec!["account is not allowed to sign in".to_string()],
                false,
                true,
                false,
            ),
            LoginOutcome::RequiresTwoFactor => (
                vec!["two-factor authentication required".to_string()],
                false,
                false,
                true,
            ),
            LoginOutcome::Failed(reasons) => (reasons.clone(), false, false, false),
            LoginOutcome::Succeeded(_) => (vec![], false, false, false),
        };
        Self {
            succeeded: false,
            errors,
            is_locked_out: locked,
            is_not_allowed: not_allowed,
            requires_two_factor: two_factor,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email)]
    pub email: String,
}

/// Generic acknowledgement for confirmation/reset requests. Returned whether
/// or not the account exists (anti-enumeration).
#[derive(Debug, Serialize, Deserialize)]
pub struct GenericAckResponse {
    pub message: String,
}

impl GenericAckResponse {
    pub fn reset_requested() -> Self {
        Self {
            message: "If the account exists, an email has been sent.".to_string(),
        }
    }

    pub fn confirmation_requested() -> Self {
        Self {
            message: "If the account exists, an email has been sent.".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmEmailQuery {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetConfirmRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8))]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ExternalCallbackQuery {
    pub code: String,
    pub state: String,
}
