//! Account registration and login

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState};

/// Request body for user registration
#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
}

/// Request body for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned after registration or login
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub points: i64,
}

/// Minimal email shape check: an `@` with a dot somewhere after it.
fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::bad_request("Invalid email address"));
    }
    Ok(())
}

/// Register a new user. Duplicate emails fail with 400.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate_email(&req.email)?;
    if req.password.len() < 6 {
        return Err(AppError::bad_request(
            "Password must be at least 6 characters",
        ));
    }

    let user = state.db.create_user(&req.email, &req.password)?;
    info!(user = %user.id, "New account registered");

    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        points: user.points,
    }))
}

/// Authenticate an existing user. Failure is always 401 with the same
/// message whether the email or the password was wrong.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.db.authenticate_user(&req.email, &req.password)?;

    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        points: user.points,
    }))
}
