//! Reservation operations and atomic balance primitives
//!
//! These are the store-level read-modify-write steps the points ledger is
//! built on. Check-then-act is always a single conditional UPDATE (or an
//! immediate transaction), so two concurrent reserves can never both
//! succeed past the balance.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{insert_ledger_entry, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{LedgerEntry, LedgerEntryKind, Reservation, ReservationStatus};

const RESERVATION_COLUMNS: &str = "id, user_id, amount, status, created_at";

fn row_to_reservation(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;

    Ok(Reservation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        status: status.parse().unwrap_or(ReservationStatus::Released),
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Atomically deduct `amount` from the user's balance, open a
    /// reservation for it, and log the spend.
    ///
    /// The decrement is conditional on `points >= amount`, so the check
    /// and the deduction are one step; no interleaving of concurrent
    /// reserves can overdraw the balance. The ledger entry commits in
    /// the same transaction, so the log never lags the balance.
    pub(crate) fn debit_and_open_reservation(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<Reservation> {
        if amount <= 0 {
            return Err(Error::InvalidData(format!(
                "Reservation amount must be positive, got {}",
                amount
            )));
        }

        let conn = self.conn()?;
        let token = Uuid::new_v4().to_string();

        // BEGIN IMMEDIATE takes the write lock up front so the conditional
        // debit and the reservation insert commit or fail together.
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| {
            let debited = conn.execute(
                "UPDATE users SET points = points - ?1 WHERE id = ?2 AND points >= ?1",
                params![amount, user_id],
            )?;

            if debited == 0 {
                let balance: Option<i64> = conn
                    .query_row(
                        "SELECT points FROM users WHERE id = ?",
                        params![user_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                return match balance {
                    Some(have) => Err(Error::InsufficientPoints { have, need: amount }),
                    None => Err(Error::UserNotFound(user_id.to_string())),
                };
            }

            conn.execute(
                "INSERT INTO reservations (id, user_id, amount, status) VALUES (?, ?, ?, 'open')",
                params![token, user_id, amount],
            )?;
            insert_ledger_entry(&conn, user_id, -amount, LedgerEntryKind::SpendInquiry.as_str())?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                self.get_reservation(&token)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    /// Get a reservation by token
    pub fn get_reservation(&self, token: &str) -> Result<Reservation> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM reservations WHERE id = ?",
                RESERVATION_COLUMNS
            ),
            params![token],
            row_to_reservation,
        )
        .optional()?
        .ok_or_else(|| Error::InvalidReservation(token.to_string()))
    }

    /// Mark an open reservation committed.
    ///
    /// No balance change: the amount was deducted when the reservation was
    /// opened. Committing a token that is not open fails with
    /// `InvalidReservation`, which is what makes double-commit detectable.
    pub(crate) fn commit_reservation(&self, token: &str) -> Result<Reservation> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE reservations SET status = 'committed' WHERE id = ? AND status = 'open'",
            params![token],
        )?;

        if updated == 0 {
            return Err(Error::InvalidReservation(token.to_string()));
        }
        self.get_reservation(token)
    }

    /// Reverse an open reservation: re-add exactly its amount to the
    /// user's balance and log the refund, in one transaction.
    ///
    /// Restores `amount` by addition, never by rewriting the whole
    /// balance, so it is safe regardless of other transactions that ran
    /// since the reserve.
    pub(crate) fn release_reservation(&self, token: &str) -> Result<Reservation> {
        let conn = self.conn()?;

        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| {
            let released = conn.execute(
                "UPDATE reservations SET status = 'released' WHERE id = ? AND status = 'open'",
                params![token],
            )?;
            if released == 0 {
                return Err(Error::InvalidReservation(token.to_string()));
            }

            conn.execute(
                "UPDATE users SET points = points + (SELECT amount FROM reservations WHERE id = ?1)
                 WHERE id = (SELECT user_id FROM reservations WHERE id = ?1)",
                params![token],
            )?;

            let (user_id, amount): (String, i64) = conn.query_row(
                "SELECT user_id, amount FROM reservations WHERE id = ?",
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            insert_ledger_entry(&conn, &user_id, amount, LedgerEntryKind::Refund.as_str())?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                self.get_reservation(token)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    /// Tokens of open reservations created before `cutoff`
    pub(crate) fn list_expired_open_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM reservations WHERE status = 'open' AND created_at < ? ORDER BY created_at",
        )?;

        let cutoff_str = cutoff.format("%Y-%m-%d %H:%M:%S").to_string();
        let tokens = stmt
            .query_map(params![cutoff_str], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(tokens)
    }

    /// List a user's ledger entries, oldest first
    pub fn list_ledger_entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, delta, kind, occurred_at FROM ledger_entries
             WHERE user_id = ? ORDER BY id",
        )?;

        let entries = stmt
            .query_map(params![user_id], |row| {
                let occurred_at: String = row.get(4)?;
                Ok(LedgerEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    delta: row.get(2)?,
                    kind: row.get(3)?,
                    occurred_at: parse_datetime(&occurred_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}
