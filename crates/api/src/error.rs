//! HTTP error mapping
//!
//! One error type at the boundary; every component error folds into the
//! taxonomy below. Internal errors never leak detail to the client; they
//! carry a correlation id that also lands in the log.

use alert_engine::AlertError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ingest_pipeline::IngestError;
use serde::Serialize;
use storage::StorageError;
use subscription_hub::HubError;
use tracing::error;
use uuid::Uuid;

#[derive(Debug)]
pub enum ApiError {
    /// 400
    Validation(String),
    /// 401
    Unauthenticated,
    /// 403
    Forbidden(String),
    /// 404
    NotFound(String),
    /// 408; safe to retry
    Timeout(String),
    /// 409
    InvalidState(String),
    /// 503; transient backend failure
    StoreUnavailable(String),
    /// 500; detail goes to the log, not the client
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<Uuid>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::InvalidState(_) => StatusCode::CONFLICT,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not-found",
            ApiError::Timeout(_) => "timeout",
            ApiError::InvalidState(_) => "invalid-state",
            ApiError::StoreUnavailable(_) => "store-unavailable",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let detail = match self {
            ApiError::Internal(message) => {
                let correlation_id = Uuid::new_v4();
                error!(%correlation_id, %message, "internal error");
                ErrorDetail {
                    code,
                    message: "Internal server error".to_string(),
                    correlation_id: Some(correlation_id),
                }
            }
            ApiError::Unauthenticated => ErrorDetail {
                code,
                message: "Authentication required".to_string(),
                correlation_id: None,
            },
            ApiError::Validation(message)
            | ApiError::Forbidden(message)
            | ApiError::NotFound(message)
            | ApiError::Timeout(message)
            | ApiError::InvalidState(message)
            | ApiError::StoreUnavailable(message) => ErrorDetail {
                code,
                message,
                correlation_id: None,
            },
        };
        (status, Json(ErrorBody { error: detail })).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingField(_) | IngestError::OutOfRange { .. } => {
                ApiError::Validation(err.to_string())
            }
            IngestError::Unauthorized(vehicle) => {
                ApiError::Forbidden(format!("Not authorised for vehicle {vehicle}"))
            }
            IngestError::Timeout(step) => {
                ApiError::Timeout(format!("Deadline exceeded during {step}"))
            }
            IngestError::Store(err) => ApiError::from(err),
            IngestError::Alert(err) => ApiError::from(err),
        }
    }
}

impl From<AlertError> for ApiError {
    fn from(err: AlertError) -> Self {
        match err {
            AlertError::NotFound => ApiError::NotFound("Alert not found".to_string()),
            AlertError::InvalidState { .. } => ApiError::InvalidState(err.to_string()),
            AlertError::Store(err) => ApiError::from(err),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound("Record not found".to_string()),
            StorageError::DatabaseError(message) => ApiError::StoreUnavailable(message),
            StorageError::SerializationError(message) => ApiError::Internal(message),
        }
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::UnknownRoom(room) => ApiError::Validation(format!("Unknown room: {room}")),
            HubError::Unauthorized(room) => {
                ApiError::Forbidden(format!("Not authorised to join room {room}"))
            }
            HubError::SessionClosed => ApiError::InvalidState("Session is closed".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::InvalidState("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Timeout("x".into()).status(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            ApiError::StoreUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn ingest_errors_map_to_statuses() {
        let err: ApiError = IngestError::MissingField("vehicleId").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = IngestError::Unauthorized("T1".into()).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err: ApiError = IngestError::Timeout("persist-fix").into();
        assert_eq!(err.status(), StatusCode::REQUEST_TIMEOUT);

        let err: ApiError =
            IngestError::Store(StorageError::DatabaseError("down".into())).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
