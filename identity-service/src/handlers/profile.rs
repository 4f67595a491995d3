//! Role and claim administration endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use platform_core::AppError;
use uuid::Uuid;

use crate::dtos::profile::{ClaimsResponse, RolesResponse, SyncClaimsRequest, SyncRolesRequest};
use crate::middleware::CallerContext;
use crate::AppState;

pub async fn get_roles(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<RolesResponse>, AppError> {
    // Reading your own roles is always allowed; reading others requires the
    // same gate as writing.
    if user_id != caller.subject_id {
        state
            .permissions
            .ensure_can_view(caller.subject_id, user_id)
            .await?;
    }
    let roles = state.permissions.role_names_of(user_id).await?;
    Ok(Json(RolesResponse { roles }))
}

pub async fn sync_roles(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SyncRolesRequest>,
) -> Result<Json<RolesResponse>, AppError> {
    let roles = state
        .permissions
        .sync_roles(caller.subject_id, user_id, req.roles)
        .await?;
    Ok(Json(RolesResponse { roles }))
}

pub async fn get_claims(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ClaimsResponse>, AppError> {
    if user_id != caller.subject_id {
        state
            .permissions
            .ensure_can_view(caller.subject_id, user_id)
            .await?;
    }
    let claims = state.permissions.claims_of(user_id).await?;
    Ok(Json(ClaimsResponse { claims }))
}

pub async fn sync_claims(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SyncClaimsRequest>,
) -> Result<Json<ClaimsResponse>, AppError> {
    let claims = state
        .permissions
        .sync_claims(caller.subject_id, user_id, req.claims)
        .await?;
    Ok(Json(ClaimsResponse { claims }))
}
