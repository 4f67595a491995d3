use platform_core::{config as core_config, AppError};
use std::env;

/// Full service configuration, environment-driven.
///
/// The signing secret is validated here: a missing or weak secret is a fatal
/// configuration error at process start, never a per-call error.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    /// Postgres connection string; the in-memory store is used when absent.
    pub database_url: Option<String>,
    /// Base URL used in confirmation/reset links and provider callbacks.
    pub public_base_url: String,
    pub jwt: JwtConfig,
    pub lockout: LockoutConfig,
    /// When true, unconfirmed accounts cannot sign in (`NotAllowed`).
    pub require_confirmed_email: bool,
    pub smtp: Option<SmtpConfig>,
    pub google: Option<GoogleConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct LockoutConfig {
    pub max_failed_attempts: i32,
    pub lockout_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment = match env_str.to_lowercase().as_str() {
            "dev" => Environment::Dev,
            "prod" => Environment::Prod,
            other => {
                return Err(AppError::Config(anyhow::anyhow!(
                    "invalid ENVIRONMENT: {}",
                    other
                )))
            }
        };
        let is_prod = environment == Environment::Prod;

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", get_env("SMTP_PORT", Some("587"), is_prod)?)?,
                user: get_env("SMTP_USER", None, is_prod)?,
                password: get_env("SMTP_PASSWORD", None, is_prod)?,
                from: get_env("SMTP_FROM", None, is_prod)?,
            }),
            Err(_) => None,
        };

        let google = match env::var("GOOGLE_CLIENT_ID") {
            Ok(client_id) => Some(GoogleConfig {
                client_id,
                client_secret: get_env("GOOGLE_CLIENT_SECRET", None, is_prod)?,
            }),
            Err(_) => None,
        };

        let config = IdentityConfig {
            common,
            environment,
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database_url: env::var("DATABASE_URL").ok(),
            public_base_url: get_env("PUBLIC_BASE_URL", Some("http://localhost:8080"), is_prod)?,
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", None, is_prod)?,
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    get_env("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", Some("60"), is_prod)?,
                )?,
            },
            lockout: LockoutConfig {
                max_failed_attempts: parse_env(
                    "LOCKOUT_MAX_FAILED_ATTEMPTS",
                    get_env("LOCKOUT_MAX_FAILED_ATTEMPTS", Some("5"), is_prod)?,
                )?,
                lockout_minutes: parse_env(
                    "LOCKOUT_MINUTES",
                    get_env("LOCKOUT_MINUTES", Some("15"), is_prod)?,
                )?,
            },
            require_confirmed_email: parse_env(
                "REQUIRE_CONFIRMED_EMAIL",
                get_env("REQUIRE_CONFIRMED_EMAIL", Some("true"), is_prod)?,
            )?,
            smtp,
            google,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt.secret.is_empty() {
            return Err(AppError::Config(anyhow::anyhow!(
                "JWT_SECRET must not be empty"
            )));
        }
        if self.environment == Environment::Prod && self.jwt.secret.len() < 32 {
            return Err(AppError::Config(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 bytes in production"
            )));
        }
        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }
        if self.lockout.max_failed_attempts <= 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "LOCKOUT_MAX_FAILED_ATTEMPTS must be positive"
            )));
        }
        if self.lockout.lockout_minutes <= 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "LOCKOUT_MINUTES must be positive"
            )));
        }
        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::Config(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::Config(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, val: String) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    val.parse()
        .map_err(|e| AppError::Config(anyhow::anyhow!("invalid {}: {}", key, e)))
}
