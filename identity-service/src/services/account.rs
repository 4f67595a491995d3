//! Credential & session authority.
//!
//! Owns the login/registration/external-linking state machine. Expected
//! outcomes of a login attempt are values, not errors: callers must handle
//! every variant of `LoginOutcome`. Terminal outcomes follow the fixed
//! priority LockedOut > NotAllowed > RequiresTwoFactor > Failed > Succeeded.

use chrono::{Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::config::LockoutConfig;
use crate::dtos::auth::{LoginRequest, RegisterRequest, RegisterResponse};
use crate::models::{Identity, SystemRole, TokenKind, VerificationToken};
use crate::store::CredentialStore;
use crate::utils::{hash_password, validate_password_policy, verify_password, Password};

use super::email::{confirmation_email, password_reset_email, NotificationSender};
use super::error::ServiceError;
use super::external::ExternalAssertion;
use super::token::TokenIssuer;

/// Terminal outcome of a login attempt.
#[derive(Debug)]
pub enum LoginOutcome {
    Succeeded(AuthSession),
    LockedOut,
    NotAllowed,
    /// Reserved: no second-factor submission path exists yet.
    RequiresTwoFactor,
    Failed(Vec<String>),
}

/// Issued session material for a successful login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    issuer: TokenIssuer,
    sender: Arc<dyn NotificationSender>,
    lockout: LockoutConfig,
    require_confirmed_email: bool,
    public_base_url: String,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        issuer: TokenIssuer,
        sender: Arc<dyn NotificationSender>,
        lockout: LockoutConfig,
        require_confirmed_email: bool,
        public_base_url: String,
    ) -> Self {
        Self {
            store,
            issuer,
            sender,
            lockout,
            require_confirmed_email,
            public_base_url,
        }
    }

    /// Register a new local-credential identity. No token is issued at
    /// registration; the caller logs in separately.
    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, ServiceError> {
        req.validate()?;
        validate_password_policy(&req.password).map_err(ServiceError::Invalid)?;

        if self.store.find_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::Conflict("email already registered".to_string()));
        }

        let password_hash = hash_password(&Password::new(req.password))?;
        let mut identity = Identity::new(req.username, req.email.clone(), password_hash);
        identity.display_name = req.display_name;
        identity.email_confirmed = !self.require_confirmed_email;

        self.store.create_identity(&identity).await?;
        self.store
            .add_to_role(identity.id, SystemRole::User.as_str())
            .await
            .map_err(|e| ServiceError::operation_failed("assign default role", e))?;

        tracing::info!(user_id = %identity.id, "Identity registered");

        if self.require_confirmed_email {
            self.produce_confirmation_token(&identity).await?;
        }

        Ok(RegisterResponse {
            user_id: identity.id,
            message: if self.require_confirmed_email {
                "Registration successful. Check your email to confirm your account.".to_string()
            } else {
                "Registration successful.".to_string()
            },
        })
    }

    /// Local username/password login with lockout bookkeeping.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginOutcome, ServiceError> {
        req.validate()?;

        let identity = match self.lookup(&req.username).await? {
            Some(identity) => identity,
            // Generic failure: never reveal whether the account exists.
            None => return Ok(failed_credentials()),
        };

        if let Some(outcome) = self.pre_signin_check(&identity) {
            return Ok(outcome);
        }

        let password_ok = identity
            .password_hash
            .as_deref()
            .map(|hash| verify_password(&Password::new(req.password), hash).is_ok())
            .unwrap_or(false);

        if !password_ok {
            let count = self.store.increment_failed_attempts(identity.id).await?;
            if count >= self.lockout.max_failed_attempts {
                let until = Utc::now() + Duration::minutes(self.lockout.lockout_minutes);
                self.store.set_lockout(identity.id, until).await?;
                tracing::warn!(user_id = %identity.id, failed_attempts = count, "Account locked out");
                return Ok(LoginOutcome::LockedOut);
            }
            return Ok(failed_credentials());
        }

        self.store.reset_failed_attempts(identity.id).await?;
        let session = self.issue_session(&identity).await?;
        tracing::info!(user_id = %identity.id, "Local login succeeded");
        Ok(LoginOutcome::Succeeded(session))
    }

    /// Complete an external-provider login from a validated assertion.
    ///
    /// Linked identities sign in subject to the same pre-checks as local
    /// login. Unlinked assertions link to an existing identity by email, or
    /// create a fresh pre-confirmed identity. Repeating the callback with the
    /// same provider/key signs in the same identity and never duplicates it.
    pub async fn external_login(
        &self,
        assertion: ExternalAssertion,
    ) -> Result<LoginOutcome, ServiceError> {
        if let Some(identity) = self
            .store
            .find_by_external_link(&assertion.provider, &assertion.subject_key)
            .await?
        {
            if let Some(outcome) = self.pre_signin_check(&identity) {
                return Ok(outcome);
            }
            let session = self.issue_session(&identity).await?;
            tracing::info!(user_id = %identity.id, provider = %assertion.provider, "External login succeeded");
            return Ok(LoginOutcome::Succeeded(session));
        }

        let email = match &assertion.email {
            Some(email) => email.clone(),
            None => {
                return Ok(LoginOutcome::Failed(vec![
                    "external provider did not supply an email address".to_string(),
                ]))
            }
        };

        let identity = match self.store.find_by_email(&email).await? {
            Some(mut existing) => {
                self.store
                    .add_external_link(existing.id, &assertion.provider, &assertion.subject_key)
                    .await
                    .map_err(|e| ServiceError::operation_failed("link external credential", e))?;
                // The provider vouched for this address, so a pending local
                // confirmation is satisfied by the link.
                if !existing.email_confirmed {
                    existing.email_confirmed = true;
                    self.store.update_identity(&existing).await?;
                }
                tracing::info!(user_id = %existing.id, provider = %assertion.provider, "External credential linked");
                existing
            }
            None => {
                // External providers are treated as having verified email
                // ownership already.
                let identity =
                    Identity::new_external(email.clone(), email, assertion.display_name.clone());
                self.store.create_identity(&identity).await?;
                self.store
                    .add_to_role(identity.id, SystemRole::User.as_str())
                    .await
                    .map_err(|e| ServiceError::operation_failed("assign default role", e))?;
                self.store
                    .add_external_link(identity.id, &assertion.provider, &assertion.subject_key)
                    .await
                    .map_err(|e| ServiceError::operation_failed("link external credential", e))?;
                tracing::info!(user_id = %identity.id, provider = %assertion.provider, "Identity created from external assertion");
                identity
            }
        };

        if let Some(outcome) = self.pre_signin_check(&identity) {
            return Ok(outcome);
        }
        let session = self.issue_session(&identity).await?;
        Ok(LoginOutcome::Succeeded(session))
    }

    /// Produce a confirmation token for the account, if it exists and is
    /// unconfirmed. Always acknowledges generically; only the log records
    /// the true outcome.
    pub async fn request_email_confirmation(&self, email: &str) -> Result<(), ServiceError> {
        match self.store.find_by_email(email).await? {
            Some(identity) if !identity.email_confirmed => {
                self.produce_confirmation_token(&identity).await?;
            }
            Some(identity) => {
                tracing::info!(user_id = %identity.id, "Confirmation requested for already-confirmed account");
            }
            None => {
                tracing::info!("Confirmation requested for unknown email");
            }
        }
        Ok(())
    }

    /// Redeem a confirmation token. Invalid, expired, and ineligible tokens
    /// all fail with the same indistinguishable error.
    pub async fn confirm_email(&self, token: &str) -> Result<(), ServiceError> {
        let stored = self
            .store
            .take_verification_token(token, TokenKind::EmailConfirmation)
            .await?
            .filter(|t| !t.is_expired())
            .ok_or_else(invalid_token)?;

        let mut identity = self
            .store
            .find_by_id(stored.user_id)
            .await?
            .ok_or_else(invalid_token)?;

        identity.email_confirmed = true;
        self.store.update_identity(&identity).await?;
        tracing::info!(user_id = %identity.id, "Email confirmed");
        Ok(())
    }

    /// Produce a password-reset token. Same anti-enumeration contract as
    /// `request_email_confirmation`.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        match self.store.find_by_email(email).await? {
            Some(identity) => {
                let token = generate_opaque_token();
                self.store
                    .save_verification_token(&VerificationToken::new_password_reset(
                        identity.id,
                        token.clone(),
                    ))
                    .await?;

                let link = format!(
                    "{}/auth/password-reset/confirm?token={}",
                    self.public_base_url, token
                );
                let (subject, html, text) = password_reset_email(&link);
                if let Err(e) = self
                    .sender
                    .send(&identity.email, &subject, &html, Some(&text))
                    .await
                {
                    tracing::error!(error = %e, user_id = %identity.id, "Password reset email failed");
                }
                tracing::info!(user_id = %identity.id, "Password reset requested");
            }
            None => {
                tracing::info!("Password reset requested for unknown email");
            }
        }
        Ok(())
    }

    /// Redeem a reset token and set a new password. Clears lockout state so
    /// a recovered account can sign in immediately.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ServiceError> {
        validate_password_policy(new_password).map_err(ServiceError::Invalid)?;

        let stored = self
            .store
            .take_verification_token(token, TokenKind::PasswordReset)
            .await?
            .filter(|t| !t.is_expired())
            .ok_or_else(invalid_token)?;

        let mut identity = self
            .store
            .find_by_id(stored.user_id)
            .await?
            .ok_or_else(invalid_token)?;

        identity.password_hash = Some(hash_password(&Password::new(new_password.to_string()))?);
        self.store.update_identity(&identity).await?;
        self.store.reset_failed_attempts(identity.id).await?;
        tracing::info!(user_id = %identity.id, "Password reset completed");
        Ok(())
    }

    /// Fixed-priority pre-signin checks shared by local and external login.
    fn pre_signin_check(&self, identity: &Identity) -> Option<LoginOutcome> {
        if identity.is_locked_out(Utc::now()) {
            return Some(LoginOutcome::LockedOut);
        }
        if self.require_confirmed_email && !identity.email_confirmed {
            return Some(LoginOutcome::NotAllowed);
        }
        if identity.two_factor_enabled {
            return Some(LoginOutcome::RequiresTwoFactor);
        }
        None
    }

    async fn issue_session(&self, identity: &Identity) -> Result<AuthSession, ServiceError> {
        let roles = self.store.get_roles(identity.id).await?;
        let token = self.issuer.issue(identity, &roles, HashMap::new())?;
        Ok(AuthSession {
            token,
            user_id: identity.id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            roles,
            expires_in: self.issuer.expiry_seconds(),
        })
    }

    async fn produce_confirmation_token(&self, identity: &Identity) -> Result<(), ServiceError> {
        let token = generate_opaque_token();
        self.store
            .save_verification_token(&VerificationToken::new_email_confirmation(
                identity.id,
                token.clone(),
            ))
            .await?;

        let link = format!("{}/auth/confirm-email?token={}", self.public_base_url, token);
        let (subject, html, text) = confirmation_email(&link);
        // Delivery is fully external; a sender failure does not undo the
        // registration and the token is already produced and logged.
        if let Err(e) = self
            .sender
            .send(&identity.email, &subject, &html, Some(&text))
            .await
        {
            tracing::error!(error = %e, user_id = %identity.id, "Confirmation email failed");
        }
        tracing::info!(user_id = %identity.id, "Email confirmation token produced");
        Ok(())
    }

    async fn lookup(&self, username: &str) -> Result<Option<Identity>, ServiceError> {
        if let Some(identity) = self.store.find_by_username(username).await? {
            return Ok(Some(identity));
        }
        if username.contains('@') {
            return Ok(self.store.find_by_email(username).await?);
        }
        Ok(None)
    }
}

fn failed_credentials() -> LoginOutcome {
    LoginOutcome::Failed(vec!["invalid username or password".to_string()])
}

fn invalid_token() -> ServiceError {
    ServiceError::Invalid("invalid or expired token".to_string())
}

fn generate_opaque_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
