//! HTTP boundary. Handlers decode JSON, call the service and translate
//! [`ReviewError`] kinds into status codes with a uniform error body:
//! `{"error": {"code": "...", "message": "..."}}`.

pub mod pull_requests;
pub mod stats;
pub mod teams;
pub mod users;

use std::sync::Arc;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::database::ReviewStore;
use crate::error::ReviewError;
use crate::service::ReviewService;

pub type SharedService<S> = Arc<ReviewService<S>>;

pub fn router<S: ReviewStore>(service: SharedService<S>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/team/add", post(teams::add_team::<S>))
        .route("/team/get", get(teams::get_team::<S>))
        .route("/team/deactivate", post(teams::deactivate_team::<S>))
        .route("/users/setIsActive", post(users::set_is_active::<S>))
        .route("/users/getReview", get(users::get_review::<S>))
        .route("/pullRequest/create", post(pull_requests::create::<S>))
        .route("/pullRequest/merge", post(pull_requests::merge::<S>))
        .route("/pullRequest/reassign", post(pull_requests::reassign::<S>))
        .route("/stats/assignments", get(stats::assignments::<S>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(service)
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "OK",
        "service": "reviewer-app",
        "timestamp": chrono::Utc::now()
    }))
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Domain error with an endpoint-specific status and code.
    Coded {
        status: StatusCode,
        code: &'static str,
        error: ReviewError,
    },
    Review(ReviewError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        Self::Review(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("invalid json: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

fn status_and_code(err: &ReviewError) -> (StatusCode, &'static str) {
    match err {
        ReviewError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ReviewError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        ReviewError::PrAlreadyMerged(_) => (StatusCode::CONFLICT, "PR_MERGED"),
        ReviewError::ReviewerNotAssigned { .. } => (StatusCode::CONFLICT, "NOT_ASSIGNED"),
        ReviewError::NoCandidatesAvailable(_) => (StatusCode::CONFLICT, "NO_CANDIDATE"),
        ReviewError::TransactionUnsupported(_) | ReviewError::Storage(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
            ApiError::Coded {
                status,
                code,
                error,
            } => (status, code, error.to_string()),
            ApiError::Review(err) if !err.is_domain() => {
                error!("Internal error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal server error".to_string(),
                )
            }
            ApiError::Review(err) => {
                let (status, code) = status_and_code(&err);
                (status, code, err.to_string())
            }
        };

        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message,
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let cases = [
            (ReviewError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (ReviewError::PrAlreadyMerged("pr".into()), StatusCode::CONFLICT, "PR_MERGED"),
            (
                ReviewError::NoCandidatesAvailable("pr".into()),
                StatusCode::CONFLICT,
                "NO_CANDIDATE",
            ),
            (
                ReviewError::Storage("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(status_and_code(&err), (status, code));
        }
    }

    #[test]
    fn storage_failures_hide_their_details() {
        let response = ApiError::from(ReviewError::Storage("disk full".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
