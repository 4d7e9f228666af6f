use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;
use crate::broadcast::{ReviewError, ValidationReport, WizardError};
use crate::composer::ComposerError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Draft failed validation; the message is the first error
    #[error("{}", .0.first_error().unwrap_or("Broadcast is invalid"))]
    InvalidDraft(ValidationReport),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl AppError {
    fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidDraft(ValidationReport {
            valid: false,
            errors: vec![message.into()],
            warnings: vec![],
        })
    }
}

impl From<WizardError> for AppError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::StepIncomplete { report, .. } => AppError::InvalidDraft(report),
            WizardError::Review(ReviewError::NotAcknowledged) => AppError::invalid(err.to_string()),
            WizardError::AtFinalStep
            | WizardError::NotOnReview(_)
            | WizardError::SendInFlight
            | WizardError::NoReviewOpen
            | WizardError::Review(ReviewError::AlreadySending) => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<ComposerError> for AppError {
    fn from(err: ComposerError) -> Self {
        match err {
            ComposerError::NotFound(id) => {
                AppError::NotFound(format!("Composer session {} not found", id))
            }
            ComposerError::NotOwner => {
                AppError::Forbidden("Composer session belongs to another admin".to_string())
            }
            ComposerError::Wizard(e) => e.into(),
            ComposerError::Backend(e) => AppError::Backend(e),
            ComposerError::Interrupted => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;

        let (status, code, client_message, log_message) = match &self {
            AppError::Auth(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                msg.clone(),
            ),
            AppError::InvalidDraft(report) => {
                details = serde_json::to_value(report).ok();
                let msg = self.to_string();
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", msg.clone(), msg)
            }
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Backend(e) => {
                let (status, code) = if e.is_timeout() {
                    (StatusCode::GATEWAY_TIMEOUT, "BACKEND_TIMEOUT")
                } else {
                    (StatusCode::BAD_GATEWAY, "BACKEND_ERROR")
                };
                (status, code, e.user_message(), e.to_string())
            }
            AppError::Internal(e) => {
                let log_msg = e.clone();
                let client_msg = if is_production() {
                    "Internal server error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", client_msg, log_msg)
            }
        };

        if status.is_server_error() {
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        } else {
            tracing::warn!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::WizardStep;

    #[test]
    fn test_wizard_errors_map_to_statuses() {
        let report = ValidationReport {
            valid: false,
            errors: vec!["Select at least one audience".to_string()],
            warnings: vec![],
        };
        let err: AppError = WizardError::StepIncomplete {
            step: WizardStep::Audience,
            report,
        }
        .into();
        assert_eq!(err.to_string(), "Select at least one audience");
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: AppError = WizardError::SendInFlight.into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        let err: AppError = WizardError::Review(ReviewError::NotAcknowledged).into();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_backend_timeout_is_gateway_timeout() {
        let err = AppError::Backend(BackendError::Timeout);
        assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);

        let err = AppError::Backend(BackendError::Rejected {
            status: 400,
            message: "Subject too long".to_string(),
        });
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_interrupted_send_is_internal_error() {
        let err: AppError = ComposerError::Interrupted.into();
        assert_eq!(err.to_string(), "Internal error: Broadcast send was interrupted");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
