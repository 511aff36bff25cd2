//! User account operations

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{insert_ledger_entry, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{LedgerEntryKind, User};

/// Starting balance for new accounts
pub const INITIAL_POINTS: i64 = 30;

const USER_COLUMNS: &str = "id, email, password_hash, points, last_sign_in, created_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let last_sign_in: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;

    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        points: row.get(3)?,
        last_sign_in: last_sign_in
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        created_at: parse_datetime(&created_at),
    })
}

/// Hash a password with Argon2id and a random salt
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::Password(format!("Failed to hash password: {}", e)))
}

impl Database {
    /// Create a new user with the given email and password.
    ///
    /// Fails with `EmailTaken` if the email is already registered
    /// (case-insensitive). The new account starts with `INITIAL_POINTS`.
    pub fn create_user(&self, email: &str, password: &str) -> Result<User> {
        let conn = self.conn()?;

        let id = Uuid::new_v4().to_string();
        let password_hash = hash_password(password)?;

        let inserted = conn.execute(
            "INSERT INTO users (id, email, password_hash, points)
             SELECT ?1, ?2, ?3, ?4
             WHERE NOT EXISTS (SELECT 1 FROM users WHERE email = ?2 COLLATE NOCASE)",
            params![id, email, password_hash, INITIAL_POINTS],
        )?;

        if inserted == 0 {
            return Err(Error::EmailTaken(email.to_string()));
        }

        self.get_user(&id)
    }

    /// Get a user by id, failing with `UserNotFound` if absent
    pub fn get_user(&self, user_id: &str) -> Result<User> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            params![user_id],
            row_to_user,
        )
        .optional()?
        .ok_or_else(|| Error::UserNotFound(user_id.to_string()))
    }

    /// Find a user by email (case-insensitive), if any
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM users WHERE email = ? COLLATE NOCASE",
                    USER_COLUMNS
                ),
                params![email],
                row_to_user,
            )
            .optional()?)
    }

    /// Verify email/password credentials.
    ///
    /// Fails with `InvalidCredentials` on either an unknown email or a
    /// wrong password; callers cannot distinguish the two.
    pub fn authenticate_user(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .find_user_by_email(email)?
            .ok_or(Error::InvalidCredentials)?;

        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| Error::Password(format!("Stored hash is invalid: {}", e)))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| Error::InvalidCredentials)?;

        Ok(user)
    }

    /// List all users, newest first
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC",
            USER_COLUMNS
        ))?;

        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Atomically award the daily sign-in: adds `reward`, stamps
    /// `last_sign_in = today`, and logs the earn in one transaction.
    ///
    /// Returns false when the user has already signed in on `today`;
    /// fails with `UserNotFound` for an unknown id. The single
    /// conditional UPDATE is what makes concurrent sign-in attempts
    /// award at most once per day.
    pub(crate) fn apply_daily_sign_in(
        &self,
        user_id: &str,
        today: NaiveDate,
        reward: i64,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let today_str = today.format("%Y-%m-%d").to_string();

        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<bool> = (|| {
            let updated = conn.execute(
                "UPDATE users SET points = points + ?1, last_sign_in = ?2
                 WHERE id = ?3 AND (last_sign_in IS NULL OR last_sign_in <> ?2)",
                params![reward, today_str, user_id],
            )?;

            if updated == 1 {
                insert_ledger_entry(&conn, user_id, reward, LedgerEntryKind::EarnSignIn.as_str())?;
            }
            Ok(updated == 1)
        })();

        match result {
            Ok(awarded) => {
                conn.execute("COMMIT", [])?;
                if awarded {
                    return Ok(true);
                }
                // Distinguish missing user from already-signed-in
                self.get_user(user_id)?;
                Ok(false)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }
}
