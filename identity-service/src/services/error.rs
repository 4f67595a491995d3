use platform_core::AppError;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Domain error taxonomy.
///
/// Expected outcomes of the login state machine are not errors; they live in
/// `LoginOutcome`. This enum covers operations whose failure the caller must
/// observe as an HTTP status.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PermissionDenied(String),

    /// A downstream collaborator failed after validation passed. `step`
    /// identifies how far the operation got; already-applied steps are not
    /// rolled back (see the role/claim sync contract).
    #[error("operation failed at step '{step}': {detail}")]
    OperationFailed {
        step: &'static str,
        detail: String,
        #[source]
        cause: Option<StoreError>,
    },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn operation_failed(step: &'static str, cause: StoreError) -> Self {
        ServiceError::OperationFailed {
            step,
            detail: cause.to_string(),
            cause: Some(cause),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound("record"),
            StoreError::Duplicate(what) => ServiceError::Conflict(format!("duplicate {}", what)),
            StoreError::Backend(e) => ServiceError::Internal(e),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            ServiceError::Validation(e) => AppError::Validation(e),
            ServiceError::Invalid(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::PermissionDenied(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::OperationFailed { step, detail, cause } => AppError::OperationFailed {
                message: format!("operation failed at step '{}'", step),
                details: Some(json!({ "step": step, "detail": detail })),
                cause: cause.map(anyhow::Error::new),
            },
            ServiceError::Internal(e) => AppError::Internal(e),
        }
    }
}
