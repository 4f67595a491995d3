//! External identity providers.
//!
//! A provider turns an OAuth authorization code into an `ExternalAssertion`;
//! everything after that (link lookup, linking, account creation, token
//! issuance) is provider-agnostic and lives in the account service.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::GoogleConfig;

use super::error::ServiceError;

/// What an external provider asserts about the authenticated subject.
#[derive(Debug, Clone)]
pub struct ExternalAssertion {
    pub provider: String,
    pub subject_key: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Opaque redirect artifact for starting an external login.
#[derive(Debug, Clone)]
pub struct LoginChallenge {
    pub provider: String,
    pub redirect_url: String,
    pub state: String,
    pub code_verifier: String,
}

#[async_trait]
pub trait ExternalProvider: Send + Sync {
    fn name(&self) -> &str;
    fn authorize_url(&self, state: &str, code_challenge: &str, callback_url: &str) -> String;
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        callback_url: &str,
    ) -> Result<ExternalAssertion, ServiceError>;
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ExternalProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn ExternalProvider>) {
        self.providers
            .insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExternalProvider>> {
        self.providers.get(name).cloned()
    }

    /// Produce the redirect/challenge artifact for a provider, with PKCE.
    /// Unknown providers fail.
    pub fn challenge(
        &self,
        provider: &str,
        callback_url: &str,
    ) -> Result<LoginChallenge, ServiceError> {
        let provider = self
            .get(provider)
            .ok_or_else(|| ServiceError::Invalid(format!("unknown login provider: {provider}")))?;

        let state = Uuid::new_v4().to_string();
        let code_verifier = {
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill(&mut bytes);
            URL_SAFE_NO_PAD.encode(bytes)
        };
        let code_challenge = {
            let mut hasher = Sha256::new();
            hasher.update(code_verifier.as_bytes());
            URL_SAFE_NO_PAD.encode(hasher.finalize())
        };

        Ok(LoginChallenge {
            provider: provider.name().to_string(),
            redirect_url: provider.authorize_url(&state, &code_challenge, callback_url),
            state,
            code_verifier,
        })
    }
}

/// Google OAuth adapter.
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: Option<String>,
    verified_email: Option<bool>,
    name: Option<String>,
}

impl GoogleProvider {
    pub fn new(config: &GoogleConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ExternalProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorize_url(&self, state: &str, code_challenge: &str, callback_url: &str) -> String {
        format!(
            "https://accounts.google.com/o/oauth2/v2/auth\
             ?client_id={}&redirect_uri={}&response_type=code\
             &scope=openid%20email%20profile&state={}\
             &code_challenge={}&code_challenge_method=S256",
            self.client_id, callback_url, state, code_challenge
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        callback_url: &str,
    ) -> Result<ExternalAssertion, ServiceError> {
        let token_res = self
            .http
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("code_verifier", code_verifier),
                ("grant_type", "authorization_code"),
                ("redirect_uri", callback_url),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Google code exchange failed");
                ServiceError::Invalid("external authentication failed".to_string())
            })?;

        if !token_res.status().is_success() {
            let status = token_res.status();
            let body = token_res.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google token exchange error");
            return Err(ServiceError::Invalid(
                "external authentication failed".to_string(),
            ));
        }

        let token: GoogleTokenResponse = token_res
            .json()
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        let user_info: GoogleUserInfo = self
            .http
            .get("https://www.googleapis.com/oauth2/v2/userinfo")
            .bearer_auth(token.access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Google userinfo fetch failed");
                ServiceError::Invalid("external authentication failed".to_string())
            })?
            .json()
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        // Only pass along an email Google itself has verified.
        let email = match user_info.verified_email {
            Some(true) => user_info.email,
            _ => None,
        };

        Ok(ExternalAssertion {
            provider: self.name().to_string(),
            subject_key: user_info.id,
            email,
            display_name: user_info.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(GoogleProvider::new(&GoogleConfig {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
        })));
        registry
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = registry()
            .challenge("orkut", "https://erp.example/cb")
            .unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
    }

    #[test]
    fn challenge_embeds_state_and_pkce() {
        let challenge = registry()
            .challenge("google", "https://erp.example/cb")
            .unwrap();
        assert!(challenge.redirect_url.contains(&challenge.state));
        assert!(challenge.redirect_url.contains("code_challenge="));
        assert!(!challenge.code_verifier.is_empty());
        // The verifier itself must never appear in the redirect.
        assert!(!challenge.redirect_url.contains(&challenge.code_verifier));
    }
}
