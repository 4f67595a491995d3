pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Json, Router,
};
use platform_core::middleware::bot_detection::bot_detection_middleware;
use platform_core::AppError;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::IdentityConfig;
use crate::services::external::ProviderRegistry;
use crate::services::{
    AccountService, CompanyService, PermissionService, TenantResolver, TokenIssuer,
};
use crate::store::CredentialStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IdentityConfig>,
    pub store: Arc<dyn CredentialStore>,
    pub issuer: TokenIssuer,
    pub providers: Arc<ProviderRegistry>,
    pub accounts: AccountService,
    pub companies: CompanyService,
    pub resolver: TenantResolver,
    pub permissions: PermissionService,
}

impl AppState {
    pub fn new(
        config: IdentityConfig,
        store: Arc<dyn CredentialStore>,
        sender: Arc<dyn services::email::NotificationSender>,
        providers: ProviderRegistry,
    ) -> Self {
        let issuer = TokenIssuer::new(
            &config.jwt.secret,
            config.jwt.access_token_expiry_minutes,
        );
        let accounts = AccountService::new(
            store.clone(),
            issuer.clone(),
            sender,
            config.lockout.clone(),
            config.require_confirmed_email,
            config.public_base_url.clone(),
        );
        Self {
            accounts,
            companies: CompanyService::new(store.clone()),
            resolver: TenantResolver::new(store.clone()),
            permissions: PermissionService::new(store.clone()),
            providers: Arc::new(providers),
            issuer,
            store,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Credential endpoints sit behind the bot gate; everything else does not.
    let credential_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route(
            "/auth/password-reset/request",
            post(handlers::auth::request_password_reset),
        )
        .route(
            "/auth/confirm-email/request",
            post(handlers::auth::request_email_confirmation),
        )
        .layer(from_fn(bot_detection_middleware));

    let protected_routes = Router::new()
        .route(
            "/profile/:user_id/roles",
            get(handlers::profile::get_roles).put(handlers::profile::sync_roles),
        )
        .route(
            "/profile/:user_id/claims",
            get(handlers::profile::get_claims).put(handlers::profile::sync_claims),
        )
        .route("/companies", post(handlers::company::create_company))
        .route("/companies/current", get(handlers::company::current_company))
        .route("/companies/:id", get(handlers::company::get_company))
        .route(
            "/companies/:id/enable",
            put(handlers::company::enable_company),
        )
        .route(
            "/companies/:id/disable",
            put(handlers::company::disable_company),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/auth/confirm-email",
            get(handlers::auth::confirm_email),
        )
        .route(
            "/auth/password-reset/confirm",
            post(handlers::auth::confirm_password_reset),
        )
        .route(
            "/auth/external/:provider",
            get(handlers::auth::external_start),
        )
        .route(
            "/auth/external/:provider/callback",
            get(handlers::auth::external_callback),
        )
        .merge(credential_routes)
        .merge(protected_routes)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .public_base_url
                        .parse::<HeaderValue>()
                        .unwrap_or_else(|_| HeaderValue::from_static("*")),
                )
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
}

pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "environment": format!("{:?}", state.config.environment),
    })))
}
