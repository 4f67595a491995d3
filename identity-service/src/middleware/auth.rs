//! Bearer-token authentication middleware.
//!
//! Decodes the Authorization header once per request and stores both the raw
//! claims and a typed `CallerContext` in request extensions for handlers.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use platform_core::AppError;
use uuid::Uuid;

use crate::models::SystemRole;
use crate::services::AccessClaims;
use crate::AppState;

/// Authenticated caller, resolved entirely from the access token.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub subject_id: Uuid,
    pub email: String,
    pub name: String,
    /// Hierarchy roles only; unknown role names in the token are dropped.
    pub roles: Vec<SystemRole>,
    pub company_id: Option<Uuid>,
    pub is_company_owner: bool,
}

impl CallerContext {
    fn from_claims(claims: &AccessClaims) -> Result<Self, AppError> {
        let subject_id = claims
            .subject_id()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("malformed subject claim")))?;
        Ok(Self {
            subject_id,
            email: claims.email.clone(),
            name: claims.name.clone(),
            roles: SystemRole::parse_known(&claims.roles),
            company_id: claims.company(),
            is_company_owner: claims.owns_company(),
        })
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("missing bearer token")))?;

    let claims = state
        .issuer
        .decode(token)
        .map_err(AppError::Unauthorized)?;
    let caller = CallerContext::from_claims(&claims)?;

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("caller context not found")))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AccessClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessClaims>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("access claims not found")))
    }
}
