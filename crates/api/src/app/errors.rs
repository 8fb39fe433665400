use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use orderdesk_infra::LifecycleError;

pub fn lifecycle_error_to_response(err: LifecycleError) -> axum::response::Response {
    match err {
        LifecycleError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        LifecycleError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        LifecycleError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        LifecycleError::ConcurrencyConflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        LifecycleError::InvalidTransition(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", msg)
        }
        LifecycleError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "the request could not be persisted",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
