use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use super::{ApiError, SharedService};
use crate::database::ReviewStore;

pub async fn assignments<S: ReviewStore>(
    State(service): State<SharedService<S>>,
) -> Result<Json<Value>, ApiError> {
    let stats = service.reviewer_stats().await?;
    Ok(Json(json!({ "stats": stats })))
}
