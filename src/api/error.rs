//! App API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::chat::ChatError;
use crate::core_state::CoreError;
use crate::onboarding::OnboardingError;
use crate::triage_form::{AttachmentError, SubmitError};
use crate::triage_api::ApiClientError;

/// Structured error response body for the web shell.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Session is still loading")]
    Loading,
    #[error("Sign in required")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Attachment(String),
    #[error("A triage analysis is already in progress")]
    SubmissionInFlight,
    #[error("The session ended before the request completed")]
    SessionChanged,
    #[error("{0}")]
    Upstream(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Loading => (
                StatusCode::SERVICE_UNAVAILABLE,
                "LOADING",
                "Session is still loading".to_string(),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Sign in required".to_string(),
            ),
            ApiError::Validation(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION",
                detail.clone(),
            ),
            ApiError::Attachment(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "ATTACHMENT",
                detail.clone(),
            ),
            ApiError::SubmissionInFlight => (
                StatusCode::CONFLICT,
                "SUBMISSION_IN_FLIGHT",
                "A triage analysis is already in progress".to_string(),
            ),
            ApiError::SessionChanged => (
                StatusCode::CONFLICT,
                "SESSION_CHANGED",
                "The session ended before the request completed".to_string(),
            ),
            ApiError::Upstream(detail) => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM",
                detail.clone(),
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotSignedIn => ApiError::Unauthorized,
            CoreError::SessionChanged => ApiError::SessionChanged,
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
        }
    }
}

impl From<ApiClientError> for ApiError {
    fn from(err: ApiClientError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<AttachmentError> for ApiError {
    fn from(err: AttachmentError) -> Self {
        ApiError::Attachment(err.to_string())
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Validation(e) => ApiError::Validation(e.to_string()),
            SubmitError::AlreadySubmitting => ApiError::SubmissionInFlight,
            SubmitError::Api(e) => e.into(),
            SubmitError::State(e) => e.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong => {
                ApiError::Validation(err.to_string())
            }
            ChatError::Api(e) => e.into(),
            ChatError::State(e) => e.into(),
        }
    }
}

impl From<OnboardingError> for ApiError {
    fn from(err: OnboardingError) -> Self {
        match err {
            OnboardingError::State(e) => e.into(),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn loading_returns_503() {
        let response = ApiError::Loading.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"]["code"], "LOADING");
    }

    #[tokio::test]
    async fn upstream_keeps_exact_message() {
        let err: ApiError = ApiClientError::Http {
            status: 503,
            message: "no capacity".into(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "UPSTREAM");
        assert_eq!(json["error"]["message"], "no capacity");
    }

    #[tokio::test]
    async fn validation_returns_422() {
        let err: ApiError =
            SubmitError::Validation(crate::triage_form::ValidationError::NoSymptoms).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION");
    }

    #[tokio::test]
    async fn attachment_returns_422() {
        let err: ApiError = AttachmentError::Empty.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"]["code"], "ATTACHMENT");
    }

    #[tokio::test]
    async fn not_signed_in_maps_to_401() {
        let err: ApiError = CoreError::NotSignedIn.into();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ended_session_maps_to_409() {
        let err: ApiError = SubmitError::State(CoreError::SessionChanged).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"]["code"], "SESSION_CHANGED");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
