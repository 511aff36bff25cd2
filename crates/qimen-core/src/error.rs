//! Error types for the Qimen service

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Password error: {0}")]
    Password(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Email is already registered: {0}")]
    EmailTaken(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Already signed in today")]
    AlreadySignedInToday,

    #[error("Insufficient points: have {have}, need {need}")]
    InsufficientPoints { have: i64, need: i64 },

    #[error("Invalid or already finalized reservation: {0}")]
    InvalidReservation(String),

    #[error("LLM provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("LLM provider timed out after {0}s")]
    ProviderTimeout(u64),

    /// Reserved for chart providers that can reject a timestamp. The
    /// built-in provider is total and never returns this.
    #[error("Chart generation failed: {0}")]
    ChartGeneration(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
