use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};

use seminar_hub_core::validation::FieldError;
use seminar_hub_core::{Resource, ServiceError};

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

#[derive(Debug)]
pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
                errors: Vec::new(),
            },
        }
    }

    pub fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.body.errors = errors;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

// Missing and foreign seminars share one response so callers cannot discover which ids exist.
impl From<ServiceError> for ProblemResponse {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(errors) => ProblemResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_failed",
                "one or more fields are invalid",
            )
            .with_errors(errors.errors().to_vec()),
            ServiceError::NotFound(Resource::Category) => ProblemResponse::new(
                StatusCode::BAD_REQUEST,
                "category_unavailable",
                "the referenced category does not exist",
            ),
            ServiceError::NotFound(_) | ServiceError::Forbidden => {
                debug!(stage = "http", reason = err.kind(), error = %err, "seminar request rejected");
                ProblemResponse::new(
                    StatusCode::BAD_REQUEST,
                    "seminar_unavailable",
                    "the requested seminar is not available",
                )
            }
            ServiceError::Store(_) | ServiceError::Identity(_) => {
                error!(stage = "http", error = %err, "seminar request failed");
                ProblemResponse::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "the request could not be completed",
                )
            }
        }
    }
}

impl From<JsonRejection> for ProblemResponse {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => ProblemResponse::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                "expected a JSON request body",
            ),
            other => ProblemResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_failed",
                other.body_text(),
            ),
        }
    }
}
