//! Qimen Core Library
//!
//! Shared functionality for the Qimen divination service:
//! - Database access and migrations (encrypted SQLite)
//! - Points ledger with reserve/commit/release semantics
//! - Qimen Dunjia chart generation
//! - Prompt assembly
//! - Pluggable LLM backends (OpenAI-compatible servers, mock)
//! - The inquiry pipeline tying the pieces together

pub mod chart;
pub mod db;
pub mod error;
pub mod inquiry;
pub mod ledger;
pub mod llm;
pub mod models;
pub mod prompts;

pub use chart::{BoardType, Chart, ChartProvider, FixedChartProvider, Palace, Pillar, QimenChartProvider};
pub use db::Database;
pub use error::{Error, Result};
pub use inquiry::{InquiryOutcome, InquiryPipeline};
pub use ledger::{PointsLedger, ReservationToken, DAILY_SIGN_IN_REWARD};
pub use llm::{LlmBackend, LlmClient, MockBackend, OpenAICompatibleBackend};
pub use models::{LedgerEntry, LedgerEntryKind, Reservation, ReservationStatus, User};
