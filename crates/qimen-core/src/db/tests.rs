//! Store-level tests: schema, accounts, and the atomic primitives

use super::*;
use crate::models::ReservationStatus;

#[test]
fn migrations_are_idempotent() {
    let db = Database::in_memory().unwrap();
    // Running again must not fail or clobber data
    db.create_user("once@example.com", "pw12345678").unwrap();
    db.run_migrations().unwrap();
    assert!(db.find_user_by_email("once@example.com").unwrap().is_some());
}

#[test]
fn new_users_start_with_the_initial_balance() {
    let db = Database::in_memory().unwrap();
    let user = db.create_user("a@example.com", "pw12345678").unwrap();

    assert_eq!(user.points, users::INITIAL_POINTS);
    assert!(user.last_sign_in.is_none());
    assert_ne!(user.password_hash, "pw12345678");
}

#[test]
fn duplicate_email_is_rejected_case_insensitively() {
    let db = Database::in_memory().unwrap();
    db.create_user("Seeker@Example.com", "pw12345678").unwrap();

    let err = db.create_user("seeker@example.com", "other-pw").unwrap_err();
    assert!(matches!(err, Error::EmailTaken(_)));
    assert_eq!(db.list_users().unwrap().len(), 1);
}

#[test]
fn authenticate_accepts_the_right_password_only() {
    let db = Database::in_memory().unwrap();
    let created = db.create_user("b@example.com", "correct horse").unwrap();

    let user = db.authenticate_user("b@example.com", "correct horse").unwrap();
    assert_eq!(user.id, created.id);

    let err = db.authenticate_user("b@example.com", "wrong").unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials));

    // Unknown email looks the same as a wrong password
    let err = db.authenticate_user("nobody@example.com", "whatever").unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials));
}

#[test]
fn get_unknown_user_fails() {
    let db = Database::in_memory().unwrap();
    let err = db.get_user("missing").unwrap_err();
    assert!(matches!(err, Error::UserNotFound(_)));
}

#[test]
fn reservation_lifecycle_at_the_store_level() {
    let db = Database::in_memory().unwrap();
    let user = db.create_user("c@example.com", "pw12345678").unwrap();

    let reservation = db.debit_and_open_reservation(&user.id, 5).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Open);
    assert_eq!(reservation.amount, 5);
    assert_eq!(db.get_user(&user.id).unwrap().points, users::INITIAL_POINTS - 5);

    let committed = db.commit_reservation(&reservation.id).unwrap();
    assert_eq!(committed.status, ReservationStatus::Committed);

    // Finalized reservations cannot be released
    let err = db.release_reservation(&reservation.id).unwrap_err();
    assert!(matches!(err, Error::InvalidReservation(_)));
}

#[test]
fn primitives_log_their_entries_in_the_same_transaction() {
    let db = Database::in_memory().unwrap();
    let user = db.create_user("log@example.com", "pw12345678").unwrap();

    let reservation = db.debit_and_open_reservation(&user.id, 4).unwrap();
    let entries = db.list_ledger_entries(&user.id).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].delta, -4);
    assert_eq!(entries[0].kind, "spend_inquiry");

    db.release_reservation(&reservation.id).unwrap();
    let entries = db.list_ledger_entries(&user.id).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].delta, 4);
    assert_eq!(entries[1].kind, "refund");

    let today = Utc::now().date_naive();
    assert!(db.apply_daily_sign_in(&user.id, today, 5).unwrap());
    let entries = db.list_ledger_entries(&user.id).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].delta, 5);
    assert_eq!(entries[2].kind, "earn_sign_in");

    // A no-op sign-in logs nothing
    assert!(!db.apply_daily_sign_in(&user.id, today, 5).unwrap());
    assert_eq!(db.list_ledger_entries(&user.id).unwrap().len(), 3);
}

#[test]
fn zero_and_negative_amounts_are_rejected() {
    let db = Database::in_memory().unwrap();
    let user = db.create_user("d@example.com", "pw12345678").unwrap();

    assert!(db.debit_and_open_reservation(&user.id, 0).is_err());
    assert!(db.debit_and_open_reservation(&user.id, -3).is_err());
    assert_eq!(db.get_user(&user.id).unwrap().points, users::INITIAL_POINTS);
}

#[test]
fn failed_debit_leaves_no_reservation_row() {
    let db = Database::in_memory().unwrap();
    let user = db.create_user("e@example.com", "pw12345678").unwrap();

    let err = db
        .debit_and_open_reservation(&user.id, users::INITIAL_POINTS + 1)
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientPoints { .. }));

    let conn = db.conn().unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM reservations", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
    assert!(db.list_ledger_entries(&user.id).unwrap().is_empty());
}

#[test]
fn expired_listing_honors_the_cutoff() {
    let db = Database::in_memory().unwrap();
    let user = db.create_user("f@example.com", "pw12345678").unwrap();

    let reservation = db.debit_and_open_reservation(&user.id, 1).unwrap();

    let future = Utc::now() + chrono::Duration::hours(1);
    let past = Utc::now() - chrono::Duration::hours(1);

    assert_eq!(
        db.list_expired_open_reservations(future).unwrap(),
        vec![reservation.id.clone()]
    );
    assert!(db.list_expired_open_reservations(past).unwrap().is_empty());
}

#[test]
fn parse_datetime_handles_sqlite_format() {
    let parsed = parse_datetime("2024-06-01 12:30:45");
    assert_eq!(parsed.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-06-01 12:30:45");
}

#[test]
fn encrypted_database_requires_its_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enc.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::new_with_key(path, Some("passphrase")).unwrap();
        db.create_user("g@example.com", "pw12345678").unwrap();
    }

    // Reopening with the right key sees the data
    let db = Database::new_with_key(path, Some("passphrase")).unwrap();
    assert!(db.find_user_by_email("g@example.com").unwrap().is_some());

    // The wrong key cannot read the file
    assert!(Database::new_with_key(path, Some("not-the-passphrase")).is_err());
}
