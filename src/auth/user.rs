//! Code for creating the user table, registering users and looking them up by credentials.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
    /// The unique name the user logs in with.
    pub username: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// The data needed to insert a user into the database.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password_hash: PasswordHash,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateUser] if the username is already taken,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "INSERT INTO user (first_name, last_name, username, password)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, first_name, last_name, username, password",
        )?
        .query_row(
            (
                &new_user.first_name,
                &new_user.last_name,
                &new_user.username,
                new_user.password_hash.as_ref(),
            ),
            map_user_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateUser(new_user.username.clone()),
            error => error.into(),
        })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, first_name, last_name, username, password FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Find the user with the login name `username`, if there is one.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn find_user_by_username(
    username: &str,
    connection: &Connection,
) -> Result<Option<User>, Error> {
    connection
        .prepare(
            "SELECT id, first_name, last_name, username, password FROM user WHERE username = :username",
        )?
        .query_row(&[(":username", &username)], map_user_row)
        .optional()
        .map_err(|error| error.into())
}

/// Find the user whose username is `username` and whose password matches `raw_password`.
///
/// Returns `None` if there is no such user or the password is wrong.
///
/// # Errors
///
/// Returns a:
/// - [Error::HashingError] if the stored hash could not be checked,
/// - or [Error::SqlError] if an SQL related error occurred.
pub fn get_user_by_credentials(
    username: &str,
    raw_password: &str,
    connection: &Connection,
) -> Result<Option<User>, Error> {
    let Some(user) = find_user_by_username(username, connection)? else {
        return Ok(None);
    };

    let is_password_valid = user
        .password_hash
        .verify(raw_password)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    Ok(is_password_valid.then_some(user))
}

/// Replace the password hash of the user `user_id`.
///
/// # Errors
///
/// Returns a:
/// - [Error::NotFound] if `user_id` does not belong to a registered user,
/// - or [Error::SqlError] if an SQL related error occurred.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(4)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        username: row.get(3)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}
