//! Metered inquiry and analysis handlers
//!
//! Every endpoint here charges through the pipeline: reserve, generate,
//! ask, commit - with the reservation released on any failure, so a
//! gateway outage costs the user nothing.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use qimen_core::prompts;

use crate::{require_user_id, AppError, AppState};

/// Points charged per inquiry or analysis
const INQUIRY_COST: i64 = 1;

/// Request body for the universal inquiry endpoint
#[derive(Deserialize)]
pub struct InquiryRequest {
    pub question: String,
}

/// Response from the universal inquiry endpoint
#[derive(Serialize)]
pub struct InquiryResponse {
    pub answer: String,
    pub points_remaining: i64,
}

/// Request body for the crypto quantification analysis
#[derive(Deserialize)]
pub struct QuantificationRequest {
    /// Cryptocurrency symbol, btc or eth
    pub crypto: String,
}

/// Request body for the destiny analysis
#[derive(Deserialize)]
pub struct DestinyRequest {
    /// Date of birth (YYYY-MM-DD)
    pub birth_date: NaiveDate,
    /// Time of birth (HH:MM)
    pub birth_time: String,
}

/// Response from the analysis endpoints
#[derive(Serialize)]
pub struct AnalysisResponse {
    pub result: String,
    pub points_remaining: i64,
}

/// Answer a free-form question using the current chart and the LLM
pub async fn inquiry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<InquiryRequest>,
) -> Result<Json<InquiryResponse>, AppError> {
    let user_id = require_user_id(&headers)?;
    let question = req.question.trim();
    if question.is_empty() {
        return Err(AppError::bad_request("Question must not be empty"));
    }

    let outcome = state
        .pipeline
        .run(&user_id, INQUIRY_COST, question)
        .await?;

    Ok(Json(InquiryResponse {
        answer: outcome.answer,
        points_remaining: outcome.points_remaining,
    }))
}

/// Bullish/bearish outlook for a cryptocurrency from the current chart
pub async fn quantification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<QuantificationRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let user_id = require_user_id(&headers)?;

    let symbol = req.crypto.to_lowercase();
    if symbol != "btc" && symbol != "eth" {
        return Err(AppError::bad_request("crypto must be btc or eth"));
    }

    let at = state.ledger().now();
    let outcome = state
        .pipeline
        .run_at(&user_id, INQUIRY_COST, at, |chart| {
            prompts::quantification_prompt(chart, &symbol)
        })
        .await?;

    Ok(Json(AnalysisResponse {
        result: outcome.answer,
        points_remaining: outcome.points_remaining,
    }))
}

/// General investment guidance from the current chart
pub async fn finance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AnalysisResponse>, AppError> {
    let user_id = require_user_id(&headers)?;

    let at = state.ledger().now();
    let outcome = state
        .pipeline
        .run_at(&user_id, INQUIRY_COST, at, prompts::finance_prompt)
        .await?;

    Ok(Json(AnalysisResponse {
        result: outcome.answer,
        points_remaining: outcome.points_remaining,
    }))
}

/// Personal destiny reading from the chart for the querent's birth instant
pub async fn destiny(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DestinyRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let user_id = require_user_id(&headers)?;

    let time = NaiveTime::parse_from_str(&req.birth_time, "%H:%M")
        .map_err(|_| AppError::bad_request("Invalid birth time, expected HH:MM"))?;
    let naive = req.birth_date.and_time(time);

    // Birth instants are interpreted in the reference zone. A local time
    // repeated by a DST transition resolves to the earlier mapping; one
    // skipped by a transition is rejected.
    let zone = state.ledger().zone();
    let at = zone
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| AppError::bad_request("Birth date/time does not exist in the reference zone"))?;

    let outcome = state
        .pipeline
        .run_at(&user_id, INQUIRY_COST, at, prompts::destiny_prompt)
        .await?;

    Ok(Json(AnalysisResponse {
        result: outcome.answer,
        points_remaining: outcome.points_remaining,
    }))
}
