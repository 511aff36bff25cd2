//! Store record types shared across the workspace

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A registered user account.
///
/// The id is an opaque v4 uuid assigned at signup and never changed.
/// `points` is only ever mutated through the [`crate::ledger::PointsLedger`].
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Argon2id password hash. Never serialized.
    #[serde(skip)]
    pub password_hash: String,
    pub points: i64,
    /// Calendar date (reference zone) of the last successful daily sign-in.
    pub last_sign_in: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a point reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Points deducted, outcome pending. Only open reservations can be
    /// committed or released.
    Open,
    Committed,
    Released,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Open => "open",
            ReservationStatus::Committed => "committed",
            ReservationStatus::Released => "released",
        }
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "open" => Ok(ReservationStatus::Open),
            "committed" => Ok(ReservationStatus::Committed),
            "released" => Ok(ReservationStatus::Released),
            other => Err(format!("Unknown reservation status: {}", other)),
        }
    }
}

/// An in-flight (or finalized) charge against a user's balance.
///
/// The reservation row, not an in-process lock, is what carries the charge
/// while the external model call is running.
#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

/// Why a user's balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    EarnSignIn,
    SpendInquiry,
    Refund,
}

impl LedgerEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryKind::EarnSignIn => "earn_sign_in",
            LedgerEntryKind::SpendInquiry => "spend_inquiry",
            LedgerEntryKind::Refund => "refund",
        }
    }
}

/// One applied balance change. The sum of a user's deltas always equals
/// their balance minus the starting balance.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: String,
    pub delta: i64,
    pub kind: String,
    pub occurred_at: DateTime<Utc>,
}
