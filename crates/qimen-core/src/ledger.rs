//! Points ledger: earn/spend rules on top of the store
//!
//! This is the only component that mutates balances. All operations
//! serialize per user through the store's atomic primitives; different
//! users never block each other, and no lock is held while a caller is
//! waiting on the network - an open reservation row carries the in-flight
//! charge instead.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::Reservation;

/// Points awarded for a successful daily sign-in
pub const DAILY_SIGN_IN_REWARD: i64 = 5;

/// Environment variable naming the reference time zone
pub const TZ_ENV: &str = "QIMEN_TZ";

/// Default reference zone when `QIMEN_TZ` is not set
pub const DEFAULT_TZ: Tz = chrono_tz::America::Los_Angeles;

/// Resolve the deployment-wide reference time zone.
///
/// One zone per deployment: "today" for the sign-in rule and the chart
/// timestamp must agree or users near midnight see boundary disputes.
pub fn reference_zone_from_env() -> Tz {
    match std::env::var(TZ_ENV) {
        Ok(name) => name.parse().unwrap_or_else(|_| {
            warn!(zone = %name, "Unknown {} value, falling back to {}", TZ_ENV, DEFAULT_TZ);
            DEFAULT_TZ
        }),
        Err(_) => DEFAULT_TZ,
    }
}

/// Opaque handle for an in-flight charge.
///
/// Returned by [`PointsLedger::reserve`]; the only things a caller can do
/// with it are commit or release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationToken(String);

impl ReservationToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReservationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Enforces the earn/spend rules. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct PointsLedger {
    db: Database,
    zone: Tz,
}

impl PointsLedger {
    pub fn new(db: Database, zone: Tz) -> Self {
        Self { db, zone }
    }

    /// Create a ledger using the zone from `QIMEN_TZ` (or the default)
    pub fn from_env(db: Database) -> Self {
        Self::new(db, reference_zone_from_env())
    }

    /// The configured reference time zone
    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Current instant in the reference zone
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.zone)
    }

    /// Today's calendar date in the reference zone
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Current balance. Fails with `UserNotFound` for an unknown id.
    pub fn get_balance(&self, user_id: &str) -> Result<i64> {
        Ok(self.db.get_user(user_id)?.points)
    }

    /// Award the daily sign-in reward, at most once per reference-zone day.
    ///
    /// Returns the new balance; fails with `AlreadySignedInToday` (and no
    /// balance change) on a repeat sign-in.
    pub fn earn_daily_sign_in(&self, user_id: &str) -> Result<i64> {
        let today = self.today();

        if !self
            .db
            .apply_daily_sign_in(user_id, today, DAILY_SIGN_IN_REWARD)?
        {
            return Err(Error::AlreadySignedInToday);
        }

        let balance = self.get_balance(user_id)?;
        info!(user = %user_id, balance, "Daily sign-in reward granted");
        Ok(balance)
    }

    /// Deduct `amount` and open a reservation for it.
    ///
    /// Fails with `InsufficientPoints` (no mutation) when the balance is
    /// too low. The deduction, the balance check, and the spend entry in
    /// the transaction log are a single atomic step in the store.
    pub fn reserve(&self, user_id: &str, amount: i64) -> Result<ReservationToken> {
        let reservation = self.db.debit_and_open_reservation(user_id, amount)?;

        debug!(user = %user_id, amount, token = %reservation.id, "Points reserved");
        Ok(ReservationToken(reservation.id))
    }

    /// Finalize a reservation. No balance change; the amount stays spent.
    ///
    /// Committing the same token twice fails with `InvalidReservation`.
    pub fn commit(&self, token: &ReservationToken) -> Result<()> {
        self.db.commit_reservation(&token.0)?;
        debug!(token = %token, "Reservation committed");
        Ok(())
    }

    /// Reverse a reservation, restoring exactly its amount.
    ///
    /// Safe to call after other transactions have changed the balance; it
    /// adds the reserved amount back rather than restoring a snapshot.
    pub fn release(&self, token: &ReservationToken) -> Result<()> {
        let reservation = self.db.release_reservation(&token.0)?;

        debug!(token = %token, amount = reservation.amount, "Reservation released");
        Ok(())
    }

    /// Look up a reservation by token (read-only, for diagnostics)
    pub fn get_reservation(&self, token: &ReservationToken) -> Result<Reservation> {
        self.db.get_reservation(&token.0)
    }

    /// Release every open reservation older than `ttl`.
    ///
    /// Recovery path for charges stranded by a crash between reserve and
    /// commit. Returns the number of reservations released.
    pub fn release_expired(&self, ttl: Duration) -> Result<usize> {
        let cutoff = Utc::now() - ttl;
        let tokens = self.db.list_expired_open_reservations(cutoff)?;
        let mut released = 0;

        for token in tokens {
            match self.release(&ReservationToken(token.clone())) {
                Ok(()) => released += 1,
                // Raced with a concurrent commit/release; nothing to do
                Err(Error::InvalidReservation(_)) => {}
                // One bad row must not strand the rest of the sweep
                Err(e) => {
                    warn!(token = %token, error = %e, "Failed to release expired reservation");
                }
            }
        }

        if released > 0 {
            info!(released, "Released expired reservations");
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::INITIAL_POINTS;

    fn setup() -> (PointsLedger, String) {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("seeker@example.com", "changeme1").unwrap();
        (PointsLedger::new(db, DEFAULT_TZ), user.id)
    }

    #[test]
    fn reserve_then_release_restores_balance() {
        let (ledger, user) = setup();

        let before = ledger.get_balance(&user).unwrap();
        let token = ledger.reserve(&user, 7).unwrap();
        assert_eq!(ledger.get_balance(&user).unwrap(), before - 7);

        ledger.release(&token).unwrap();
        assert_eq!(ledger.get_balance(&user).unwrap(), before);
    }

    #[test]
    fn reserve_fails_without_mutation_when_insufficient() {
        let (ledger, user) = setup();

        let err = ledger.reserve(&user, INITIAL_POINTS + 1).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientPoints { have, need }
                if have == INITIAL_POINTS && need == INITIAL_POINTS + 1
        ));
        assert_eq!(ledger.get_balance(&user).unwrap(), INITIAL_POINTS);
    }

    #[test]
    fn reserve_unknown_user() {
        let (ledger, _) = setup();
        let err = ledger.reserve("no-such-user", 1).unwrap_err();
        assert!(matches!(err, Error::UserNotFound(_)));
    }

    #[test]
    fn commit_twice_fails() {
        let (ledger, user) = setup();

        let token = ledger.reserve(&user, 1).unwrap();
        ledger.commit(&token).unwrap();

        let err = ledger.commit(&token).unwrap_err();
        assert!(matches!(err, Error::InvalidReservation(_)));
    }

    #[test]
    fn release_after_commit_fails() {
        let (ledger, user) = setup();

        let token = ledger.reserve(&user, 1).unwrap();
        ledger.commit(&token).unwrap();

        let err = ledger.release(&token).unwrap_err();
        assert!(matches!(err, Error::InvalidReservation(_)));
        // Committed spend stays spent
        assert_eq!(ledger.get_balance(&user).unwrap(), INITIAL_POINTS - 1);
    }

    #[test]
    fn release_restores_exact_amount_despite_interleaved_earn() {
        let (ledger, user) = setup();

        let token = ledger.reserve(&user, 10).unwrap();
        ledger.earn_daily_sign_in(&user).unwrap();

        ledger.release(&token).unwrap();
        assert_eq!(
            ledger.get_balance(&user).unwrap(),
            INITIAL_POINTS + DAILY_SIGN_IN_REWARD
        );
    }

    #[test]
    fn second_sign_in_same_day_fails_once_balance_changes_once() {
        let (ledger, user) = setup();

        let balance = ledger.earn_daily_sign_in(&user).unwrap();
        assert_eq!(balance, INITIAL_POINTS + DAILY_SIGN_IN_REWARD);

        let err = ledger.earn_daily_sign_in(&user).unwrap_err();
        assert!(matches!(err, Error::AlreadySignedInToday));
        assert_eq!(
            ledger.get_balance(&user).unwrap(),
            INITIAL_POINTS + DAILY_SIGN_IN_REWARD
        );
    }

    #[test]
    fn sign_in_on_a_new_day_succeeds() {
        let (ledger, user) = setup();
        ledger.earn_daily_sign_in(&user).unwrap();

        // Backdate the stamp to yesterday
        let conn = ledger.db.conn().unwrap();
        conn.execute(
            "UPDATE users SET last_sign_in = date(last_sign_in, '-1 day') WHERE id = ?",
            rusqlite::params![user],
        )
        .unwrap();

        let balance = ledger.earn_daily_sign_in(&user).unwrap();
        assert_eq!(balance, INITIAL_POINTS + 2 * DAILY_SIGN_IN_REWARD);
    }

    #[test]
    fn concurrent_reserves_never_overdraw() {
        // N reserve attempts of cost C against balance B with N*C > B:
        // at most B/C may succeed.
        let (ledger, user) = setup();
        let cost = 4;
        let attempts = 12; // 12 * 4 = 48 > 30

        let handles: Vec<_> = (0..attempts)
            .map(|_| {
                let ledger = ledger.clone();
                let user = user.clone();
                std::thread::spawn(move || ledger.reserve(&user, cost).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count() as i64;

        assert!(successes * cost <= INITIAL_POINTS, "overdraft: {} reserves of {}", successes, cost);
        assert_eq!(
            ledger.get_balance(&user).unwrap(),
            INITIAL_POINTS - successes * cost
        );
    }

    #[test]
    fn expired_open_reservations_are_swept() {
        let (ledger, user) = setup();

        let stale = ledger.reserve(&user, 3).unwrap();
        let fresh = ledger.reserve(&user, 2).unwrap();

        // Backdate the first reservation past the ttl
        let conn = ledger.db.conn().unwrap();
        conn.execute(
            "UPDATE reservations SET created_at = datetime('now', '-1 hour') WHERE id = ?",
            rusqlite::params![stale.as_str()],
        )
        .unwrap();

        let released = ledger.release_expired(Duration::minutes(15)).unwrap();
        assert_eq!(released, 1);
        assert_eq!(ledger.get_balance(&user).unwrap(), INITIAL_POINTS - 2);

        // The fresh reservation is still open and committable
        ledger.commit(&fresh).unwrap();
    }

    #[test]
    fn sweep_refund_keeps_the_log_consistent() {
        // A swept release must log its refund in the same transaction
        // as the balance restore, or the sum-of-deltas invariant breaks.
        let (ledger, user) = setup();

        let stale = ledger.reserve(&user, 7).unwrap();
        let conn = ledger.db.conn().unwrap();
        conn.execute(
            "UPDATE reservations SET created_at = datetime('now', '-1 hour') WHERE id = ?",
            rusqlite::params![stale.as_str()],
        )
        .unwrap();

        assert_eq!(ledger.release_expired(Duration::minutes(15)).unwrap(), 1);

        let entries = ledger.db.list_ledger_entries(&user).unwrap();
        let sum: i64 = entries.iter().map(|e| e.delta).sum();
        assert_eq!(sum, ledger.get_balance(&user).unwrap() - INITIAL_POINTS);
        assert_eq!(sum, 0);
    }

    #[test]
    fn sweep_continues_past_rows_it_cannot_release() {
        let (ledger, user) = setup();

        let stale = ledger.reserve(&user, 3).unwrap();
        let conn = ledger.db.conn().unwrap();
        conn.execute(
            "UPDATE reservations SET created_at = datetime('now', '-1 hour') WHERE id = ?",
            rusqlite::params![stale.as_str()],
        )
        .unwrap();

        // Break the log table so the release fails mid-transaction
        conn.execute("DROP TABLE ledger_entries", []).unwrap();

        // The sweep reports the failure but does not abort
        assert_eq!(ledger.release_expired(Duration::minutes(15)).unwrap(), 0);

        // The failed release rolled back whole: still open, still debited
        let reservation = ledger.get_reservation(&stale).unwrap();
        assert_eq!(reservation.status, crate::models::ReservationStatus::Open);
        assert_eq!(ledger.get_balance(&user).unwrap(), INITIAL_POINTS - 3);
    }

    #[test]
    fn ledger_entries_sum_to_balance_delta() {
        let (ledger, user) = setup();

        ledger.earn_daily_sign_in(&user).unwrap();
        let token = ledger.reserve(&user, 6).unwrap();
        ledger.release(&token).unwrap();
        let token = ledger.reserve(&user, 2).unwrap();
        ledger.commit(&token).unwrap();

        let entries = ledger.db.list_ledger_entries(&user).unwrap();
        let sum: i64 = entries.iter().map(|e| e.delta).sum();
        assert_eq!(
            sum,
            ledger.get_balance(&user).unwrap() - INITIAL_POINTS
        );
    }
}
