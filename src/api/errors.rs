use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::attempt_lifecycle::AttemptError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    BadRequest(String),
    /// Attempt rule violation with its stable machine code.
    Attempt { status: StatusCode, code: &'static str, detail: String },
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<AttemptError> for ApiError {
    fn from(err: AttemptError) -> Self {
        let status = match &err {
            AttemptError::EntitlementRequired | AttemptError::Forbidden => StatusCode::FORBIDDEN,
            AttemptError::EmptyTest => StatusCode::UNPROCESSABLE_ENTITY,
            AttemptError::NotFound(_) => StatusCode::NOT_FOUND,
            AttemptError::AttemptExpired
            | AttemptError::AttemptCompleted
            | AttemptError::AlreadyCompleted => StatusCode::CONFLICT,
            AttemptError::Validation(_) => StatusCode::BAD_REQUEST,
            AttemptError::Database(db_err) => {
                return ApiError::internal(db_err, "Attempt storage failure");
            }
        };

        ApiError::Attempt { status, code: err.code(), detail: err.to_string() }
    }
}

fn error_body(status: StatusCode, code: Option<&'static str>, detail: String) -> Response {
    (status, Json(ErrorResponse { status: status.as_u16(), code, detail })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let mut response =
                    error_body(StatusCode::UNAUTHORIZED, None, message.to_string());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::BadRequest(message) => {
                error_body(StatusCode::BAD_REQUEST, Some("VALIDATION"), message)
            }
            ApiError::Attempt { status, code, detail } => error_body(status, Some(code), detail),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, Some("INTERNAL"), message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::body::to_bytes;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;

    use crate::services::attempt_lifecycle::AttemptError;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&body).expect("json"))
    }

    #[tokio::test]
    async fn attempt_errors_map_to_status_and_code() {
        let cases = [
            (AttemptError::EntitlementRequired, StatusCode::FORBIDDEN, "ENTITLEMENT_REQUIRED"),
            (AttemptError::EmptyTest, StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_TEST"),
            (AttemptError::NotFound("Attempt"), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AttemptError::Forbidden, StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AttemptError::AttemptExpired, StatusCode::CONFLICT, "ATTEMPT_EXPIRED"),
            (AttemptError::AttemptCompleted, StatusCode::CONFLICT, "ATTEMPT_COMPLETED"),
            (AttemptError::AlreadyCompleted, StatusCode::CONFLICT, "ALREADY_COMPLETED"),
            (AttemptError::Validation("bad".into()), StatusCode::BAD_REQUEST, "VALIDATION"),
        ];

        for (err, expected_status, expected_code) in cases {
            let (status, body) = render(err.into()).await;
            assert_eq!(status, expected_status);
            assert_eq!(body["code"], expected_code);
            assert_eq!(body["status"], expected_status.as_u16());
        }
    }

    #[tokio::test]
    async fn database_errors_hide_details() {
        let (status, body) = render(AttemptError::Database(sqlx::Error::PoolTimedOut).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "INTERNAL");
        assert_eq!(body["detail"], "Attempt storage failure");
    }

    #[tokio::test]
    async fn unauthorized_sets_bearer_challenge() {
        let response = ApiError::Unauthorized("Invalid authentication credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
