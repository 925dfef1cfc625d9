use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, SharedService};
use crate::database::ReviewStore;

#[derive(Debug, Deserialize)]
pub struct SetIsActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserParams {
    pub user_id: Option<String>,
}

pub async fn set_is_active<S: ReviewStore>(
    State(service): State<SharedService<S>>,
    payload: Result<Json<SetIsActiveRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let member = service
        .set_member_active(&request.user_id, request.is_active)
        .await?;
    Ok(Json(json!({ "user": member })))
}

pub async fn get_review<S: ReviewStore>(
    State(service): State<SharedService<S>>,
    params: Result<Query<UserParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let user_id = params
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("user_id is required"))?;

    let pull_requests = service.list_prs_by_reviewer(&user_id).await?;
    Ok(Json(json!({
        "user_id": user_id,
        "pull_requests": pull_requests,
    })))
}
