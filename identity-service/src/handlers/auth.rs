//! Credential and session endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use platform_core::AppError;
use validator::Validate;

use crate::dtos::auth::{
    ConfirmEmailQuery, EmailRequest, ExternalCallbackQuery, GenericAckResponse,
    LoginFailureResponse, LoginRequest, LoginSuccessResponse, PasswordResetConfirmRequest,
    RegisterRequest,
};
use crate::services::LoginOutcome;
use crate::AppState;

const STATE_COOKIE: &str = "ext_login_state";
const VERIFIER_COOKIE: &str = "ext_login_verifier";

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let res = state.accounts.register(req).await?;
    Ok((StatusCode::CREATED, Json(res)).into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let outcome = state.accounts.login(req).await?;
    Ok(login_response(outcome))
}

/// Every terminal outcome becomes a response here; only infrastructure
/// failures surface as errors.
fn login_response(outcome: LoginOutcome) -> Response {
    match outcome {
        LoginOutcome::Succeeded(session) => {
            Json(LoginSuccessResponse::from(session)).into_response()
        }
        other => (
            StatusCode::UNAUTHORIZED,
            Json(LoginFailureResponse::from_outcome(&other)),
        )
            .into_response(),
    }
}

pub async fn request_email_confirmation(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<GenericAckResponse>, AppError> {
    req.validate()?;
    state.accounts.request_email_confirmation(&req.email).await?;
    Ok(Json(GenericAckResponse::confirmation_requested()))
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Query(query): Query<ConfirmEmailQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.accounts.confirm_email(&query.token).await?;
    Ok(Json(serde_json::json!({ "message": "email confirmed" })))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<GenericAckResponse>, AppError> {
    req.validate()?;
    state.accounts.request_password_reset(&req.email).await?;
    Ok(Json(GenericAckResponse::reset_requested()))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetConfirmRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    req.validate()?;
    state
        .accounts
        .reset_password(&req.token, &req.new_password)
        .await?;
    Ok(Json(serde_json::json!({ "message": "password updated" })))
}

/// Start an external login: redirect to the provider, parking the CSRF state
/// and PKCE verifier in short-lived cookies for the callback.
pub async fn external_start(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(provider): Path<String>,
) -> Result<(CookieJar, Redirect), AppError> {
    let callback_url = external_callback_url(&state, &provider);
    let challenge = state.providers.challenge(&provider, &callback_url)?;

    let jar = jar
        .add(transient_cookie(STATE_COOKIE, challenge.state.clone()))
        .add(transient_cookie(VERIFIER_COOKIE, challenge.code_verifier.clone()));
    Ok((jar, Redirect::temporary(&challenge.redirect_url)))
}

pub async fn external_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(provider): Path<String>,
    Query(query): Query<ExternalCallbackQuery>,
) -> Result<(CookieJar, Response), AppError> {
    let expected_state = jar
        .get(STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("missing login state")))?;
    if expected_state != query.state {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "login state mismatch"
        )));
    }
    let verifier = jar
        .get(VERIFIER_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("missing login verifier")))?;

    let jar = jar
        .remove(Cookie::from(STATE_COOKIE))
        .remove(Cookie::from(VERIFIER_COOKIE));

    let provider = state
        .providers
        .get(&provider)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("unknown login provider")))?;
    let callback_url = external_callback_url(&state, provider.name());
    let assertion = provider
        .exchange_code(&query.code, &verifier, &callback_url)
        .await?;

    let outcome = state.accounts.external_login(assertion).await?;
    Ok((jar, login_response(outcome)))
}

fn external_callback_url(state: &AppState, provider: &str) -> String {
    format!(
        "{}/auth/external/{}/callback",
        state.config.public_base_url, provider
    )
}

fn transient_cookie(name: &'static str, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::minutes(10));
    cookie
}
