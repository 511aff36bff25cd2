//! Balance and daily sign-in handlers

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::{require_user_id, AppError, AppState};

/// Balance snapshot returned by the points endpoints
#[derive(Serialize)]
pub struct PointsResponse {
    pub user_id: String,
    pub points: i64,
}

/// Current point balance for the authenticated user
pub async fn get_points(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PointsResponse>, AppError> {
    let user_id = require_user_id(&headers)?;
    let points = state.ledger().get_balance(&user_id)?;

    Ok(Json(PointsResponse { user_id, points }))
}

/// Daily sign-in. Awards the reward at most once per reference-zone day;
/// a repeat attempt fails with 400 and no balance change.
pub async fn earn_points(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PointsResponse>, AppError> {
    let user_id = require_user_id(&headers)?;
    let points = state.ledger().earn_daily_sign_in(&user_id)?;

    Ok(Json(PointsResponse { user_id, points }))
}
