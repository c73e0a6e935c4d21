//! Session storage: creating, validating and expiring the opaque tokens handed out at log-in.
//!
//! Only a SHA-256 hash of each token is stored, so a leaked database does not
//! leak usable tokens.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, auth::UserID};

/// How long a session is valid for after logging in.
pub const SESSION_DURATION: Duration = Duration::minutes(30);

/// An opaque string that identifies an authenticated, time-bounded login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Create a new random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap a token received from a client.
    ///
    /// No validation is done here, an unknown token is simply not found in the session table.
    pub fn new_unchecked(raw_token: &str) -> Self {
        Self(raw_token.to_owned())
    }

    /// The token as it should be sent to the client.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex encoded SHA-256 hash of the token, the form in which it is stored.
    fn hash(&self) -> String {
        format!("{:x}", Sha256::digest(self.0.as_bytes()))
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Avoid leaking tokens into the logs.
        write!(f, "{}", str::repeat("*", 8))
    }
}

/// A login session for a user.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The user the session belongs to.
    pub user_id: UserID,
    /// The host the user logged in from.
    pub hostname: String,
    /// The time at which the session stops being valid.
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// Whether the session is still valid at the time `now`.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

/// Create the session table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_session_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS session (
                token_hash TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                hostname TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Start a new session for `user_id` that expires at `expires_at`.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred, e.g. `user_id` does not refer to a user.
pub fn create_session(
    user_id: UserID,
    hostname: &str,
    expires_at: OffsetDateTime,
    connection: &Connection,
) -> Result<SessionToken, Error> {
    let token = SessionToken::generate();

    connection.execute(
        "INSERT INTO session (token_hash, user_id, hostname, expires_at) VALUES (?1, ?2, ?3, ?4)",
        (token.hash(), user_id.as_i64(), hostname, expires_at),
    )?;

    Ok(token)
}

/// Get the session for `token`, expired or not.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_session(token: &SessionToken, connection: &Connection) -> Result<Option<Session>, Error> {
    connection
        .prepare("SELECT user_id, hostname, expires_at FROM session WHERE token_hash = :token_hash")?
        .query_row(&[(":token_hash", &token.hash())], |row| {
            Ok(Session {
                user_id: UserID::new(row.get(0)?),
                hostname: row.get(1)?,
                expires_at: row.get(2)?,
            })
        })
        .optional()
        .map_err(|error| error.into())
}

/// Whether `token` refers to a session that has not expired at the time `now`.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn validate_session(
    token: &SessionToken,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<bool, Error> {
    Ok(get_session(token, connection)?.is_some_and(|session| session.is_valid_at(now)))
}

/// Invalidate the session for `token` from the time `now` onwards.
///
/// Expiring an unknown or already expired token is not an error and leaves the
/// session table untouched.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn expire_session(
    token: &SessionToken,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    match get_session(token, connection)? {
        Some(session) if session.is_valid_at(now) => {
            connection.execute(
                "UPDATE session SET expires_at = ?1 WHERE token_hash = ?2",
                (now, token.hash()),
            )?;
        }
        _ => {}
    }

    Ok(())
}

/// Delete every session that has expired at the time `now`.
///
/// Returns the number of sessions deleted.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn delete_expired_sessions(now: OffsetDateTime, connection: &Connection) -> Result<usize, Error> {
    let expired_hashes = connection
        .prepare("SELECT token_hash, expires_at FROM session")?
        .query_map([], |row| {
            let token_hash: String = row.get(0)?;
            let expires_at: OffsetDateTime = row.get(1)?;

            Ok((token_hash, expires_at))
        })?
        .filter_map(|row| match row {
            Ok((token_hash, expires_at)) if expires_at <= now => Some(Ok(token_hash)),
            Ok(_) => None,
            Err(error) => Some(Err(error)),
        })
        .collect::<Result<Vec<String>, rusqlite::Error>>()?;

    let mut statement = connection.prepare("DELETE FROM session WHERE token_hash = ?1")?;
    let mut deleted = 0;
    for token_hash in expired_hashes {
        deleted += statement.execute((token_hash,))?;
    }

    Ok(deleted)
}
