use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let message = error.client_message();
        match error {
            ApplicationError::Domain(DomainError::ValidationError { .. }) => {
                ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
            }
            ApplicationError::Domain(DomainError::PermissionDenied { .. }) => {
                ApiError::new(StatusCode::FORBIDDEN, "PERMISSION_DENIED", message)
            }
            ApplicationError::Domain(DomainError::ResourceNotFound { .. }) => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            ApplicationError::Domain(DomainError::ResourceAlreadyExists { .. }) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", message)
            }
            ApplicationError::Domain(DomainError::BusinessRuleViolation { .. }) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "BUSINESS_RULE_VIOLATION", message)
            }
            ApplicationError::Domain(DomainError::DatabaseError { message: detail }) => {
                tracing::error!(error = %detail, "store failure while handling request");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", message)
            }
            ApplicationError::Authentication(_) => {
                ApiError::new(StatusCode::UNAUTHORIZED, "AUTHENTICATION_FAILED", message)
            }
            ApplicationError::Authorization(_) => {
                ApiError::new(StatusCode::FORBIDDEN, "AUTHORIZATION_FAILED", message)
            }
            ApplicationError::Infrastructure(detail) => {
                tracing::error!(error = %detail, "infrastructure failure while handling request");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INFRASTRUCTURE_ERROR", message)
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_errors_map_to_status_codes() {
        let cases = [
            (
                ApplicationError::from(DomainError::validation_error("content", "empty")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApplicationError::from(DomainError::resource_not_found("conversation", "x")),
                StatusCode::NOT_FOUND,
            ),
            (ApplicationError::not_participant(), StatusCode::FORBIDDEN),
            (
                ApplicationError::authentication("missing credential"),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApplicationError::from(DomainError::database_error("timeout")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn database_details_stay_internal() {
        let error = ApiError::from(DomainError::database_error("password authentication failed"));
        assert_eq!(error.body.message, "internal server error");
    }
}
