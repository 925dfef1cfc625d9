use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, SharedService};
use crate::database::ReviewStore;
use crate::error::ReviewError;

#[derive(Debug, Deserialize)]
pub struct CreatePrRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MergePrRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub pull_request_id: String,
    pub old_reviewer_id: String,
}

pub async fn create<S: ReviewStore>(
    State(service): State<SharedService<S>>,
    payload: Result<Json<CreatePrRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = payload?;
    if request.pull_request_id.is_empty() {
        return Err(ApiError::bad_request("pull_request_id is required"));
    }

    let pr = service
        .create_pull_request(
            &request.pull_request_id,
            &request.pull_request_name,
            &request.author_id,
        )
        .await
        .map_err(|err| match err {
            ReviewError::Conflict(_) => ApiError::Coded {
                status: StatusCode::CONFLICT,
                code: "PR_EXISTS",
                error: err,
            },
            other => other.into(),
        })?;

    Ok((StatusCode::CREATED, Json(json!({ "pr": pr }))))
}

pub async fn merge<S: ReviewStore>(
    State(service): State<SharedService<S>>,
    payload: Result<Json<MergePrRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let pr = service.merge_pull_request(&request.pull_request_id).await?;
    Ok(Json(json!({ "pr": pr })))
}

pub async fn reassign<S: ReviewStore>(
    State(service): State<SharedService<S>>,
    payload: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let reassignment = service
        .reassign_reviewer(&request.pull_request_id, &request.old_reviewer_id)
        .await?;

    Ok(Json(json!({
        "pr": reassignment.pr,
        "replaced_by": reassignment.replaced_by.id,
    })))
}
