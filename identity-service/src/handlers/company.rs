//! Company lifecycle and tenant resolution endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use platform_core::AppError;
use uuid::Uuid;

use crate::dtos::company::{CreateCompanyRequest, CurrentCompanyResponse};
use crate::middleware::CallerContext;
use crate::models::CompanyResponse;
use crate::services::{permission, AccessClaims};
use crate::AppState;

pub async fn create_company(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<Response, AppError> {
    let company = state
        .companies
        .create_company(caller.subject_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(CompanyResponse::from(company))).into_response())
}

pub async fn get_company(
    State(state): State<AppState>,
    _caller: CallerContext,
    Path(id): Path<Uuid>,
) -> Result<Json<CompanyResponse>, AppError> {
    let company = state.companies.get_company(id).await?;
    Ok(Json(CompanyResponse::from(company)))
}

/// Which company the caller acts for, resolved from the token claim with
/// store fallback.
pub async fn current_company(
    State(state): State<AppState>,
    claims: AccessClaims,
) -> Result<Json<CurrentCompanyResponse>, AppError> {
    let company_id = state.resolver.resolve(&claims).await?;
    Ok(Json(CurrentCompanyResponse { company_id }))
}

pub async fn enable_company(
    state: State<AppState>,
    caller: CallerContext,
    id: Path<Uuid>,
) -> Result<Json<CompanyResponse>, AppError> {
    set_company_enabled(state, caller, id, true).await
}

pub async fn disable_company(
    state: State<AppState>,
    caller: CallerContext,
    id: Path<Uuid>,
) -> Result<Json<CompanyResponse>, AppError> {
    set_company_enabled(state, caller, id, false).await
}

async fn set_company_enabled(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(id): Path<Uuid>,
    enabled: bool,
) -> Result<Json<CompanyResponse>, AppError> {
    if !permission::can_manage_company(
        &caller.roles,
        caller.company_id,
        caller.is_company_owner,
        id,
    ) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "not allowed to manage this company"
        )));
    }
    let company = state.companies.set_enabled(id, enabled).await?;
    Ok(Json(CompanyResponse::from(company)))
}
