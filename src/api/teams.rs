use std::collections::HashSet;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{ApiError, SharedService};
use crate::database::models::TeamMember;
use crate::database::ReviewStore;
use crate::error::ReviewError;

#[derive(Debug, Deserialize)]
pub struct AddTeamRequest {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Deserialize)]
pub struct TeamNameParams {
    pub team_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeactivateTeamRequest {
    pub team_name: String,
}

pub async fn add_team<S: ReviewStore>(
    State(service): State<SharedService<S>>,
    payload: Result<Json<AddTeamRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = payload?;
    if request.team_name.trim().is_empty() {
        return Err(ApiError::bad_request("team_name is required"));
    }

    let mut seen = HashSet::new();
    for member in &request.members {
        if !seen.insert(member.user_id.as_str()) {
            return Err(ApiError::bad_request(format!(
                "duplicate user_id found in request: {}",
                member.user_id
            )));
        }
    }

    let team = match service
        .create_team(&request.team_name, &request.members)
        .await
    {
        Ok(team) => team,
        Err(err @ ReviewError::Conflict(_)) => {
            // A failed creation rolls back, so the team only exists here if
            // its name was the clash. Member id clashes stay a plain conflict.
            if service.get_team(&request.team_name).await.is_ok() {
                return Err(ApiError::Coded {
                    status: StatusCode::BAD_REQUEST,
                    code: "TEAM_EXISTS",
                    error: err,
                });
            }
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    Ok((StatusCode::CREATED, Json(json!({ "team": team }))))
}

pub async fn get_team<S: ReviewStore>(
    State(service): State<SharedService<S>>,
    params: Result<Query<TeamNameParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let name = params
        .team_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("team_name is required"))?;

    let team = service.get_team(&name).await?;
    Ok(Json(json!(team)))
}

pub async fn deactivate_team<S: ReviewStore>(
    State(service): State<SharedService<S>>,
    payload: Result<Json<DeactivateTeamRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    if request.team_name.is_empty() {
        return Err(ApiError::bad_request("team_name is required"));
    }

    let result = service.deactivate_team(&request.team_name).await?;
    info!(
        "Team {} deactivated via API ({} members)",
        request.team_name,
        result.deactivated_members.len()
    );
    Ok(Json(json!(result)))
}
