//! Registration, log-in, token validation and log-out built on top of the user and session stores.

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{
        PasswordHash, SESSION_DURATION, SessionToken, User, UserID,
        session::{
            create_session, delete_expired_sessions, expire_session, get_session, validate_session,
        },
        user::{NewUser, create_user, get_user_by_credentials},
    },
};

/// The details entered by a user when registering.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub password_confirm: &'a str,
}

/// A user together with the token for the session that was just started for them.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedInUser {
    pub user: User,
    pub token: SessionToken,
    pub expires_at: OffsetDateTime,
}

/// Register a new user, hashing their password with `password_cost`.
///
/// # Errors
///
/// Returns a:
/// - [Error::InvalidInput] if the password and its confirmation differ or a field is empty,
///   these checks happen before the user table is touched,
/// - [Error::DuplicateUser] if the username is already taken,
/// - [Error::HashingError] if the password could not be hashed,
/// - or [Error::SqlError] if an SQL related error occurred.
pub fn register(
    registration: Registration,
    password_cost: u32,
    connection: &Connection,
) -> Result<User, Error> {
    if registration.password != registration.password_confirm {
        return Err(Error::InvalidInput("Passwords do not match".to_owned()));
    }

    let username = registration.username.trim();
    let first_name = registration.first_name.trim();
    let last_name = registration.last_name.trim();

    if username.is_empty() || first_name.is_empty() || last_name.is_empty() {
        return Err(Error::InvalidInput(
            "First name, last name and username are required".to_owned(),
        ));
    }

    if registration.password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_owned()));
    }

    let password_hash = PasswordHash::new(registration.password, password_cost)?;

    let user = create_user(
        NewUser {
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            username: username.to_owned(),
            password_hash,
        },
        connection,
    )?;

    tracing::info!("Registered user {} ({})", user.id, user.username);

    Ok(user)
}

/// Check the credentials and start a session that is valid for [SESSION_DURATION] from `now`.
///
/// # Errors
///
/// Returns a:
/// - [Error::Unauthorized] if no user has the username and password,
/// - [Error::HashingError] if the stored password hash could not be checked,
/// - or [Error::SqlError] if an SQL related error occurred.
pub fn log_in(
    username: &str,
    password: &str,
    hostname: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<LoggedInUser, Error> {
    let Some(user) = get_user_by_credentials(username.trim(), password, connection)? else {
        tracing::info!("Failed log-in attempt for username {username:?} from {hostname}");
        return Err(Error::Unauthorized);
    };

    // Keep the session table from growing without bound.
    if let Err(error) = delete_expired_sessions(now, connection) {
        tracing::warn!("Could not delete expired sessions: {error}");
    }

    let expires_at = now + SESSION_DURATION;
    let token = create_session(user.id, hostname, expires_at, connection)?;

    tracing::info!("User {} logged in from {hostname}", user.id);

    Ok(LoggedInUser {
        user,
        token,
        expires_at,
    })
}

/// Whether `token` belongs to a session that is still valid at `now`.
///
/// A missing or empty token is never valid.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn is_valid_token(
    token: Option<&str>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<bool, Error> {
    match token {
        Some(token) if !token.is_empty() => {
            validate_session(&SessionToken::new_unchecked(token), now, connection)
        }
        _ => Ok(false),
    }
}

/// Get the ID of the user that holds the session for `token`, if that session is still valid at `now`.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn user_for_token(
    token: Option<&str>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Option<UserID>, Error> {
    let token = match token {
        Some(token) if !token.is_empty() => SessionToken::new_unchecked(token),
        _ => return Ok(None),
    };

    let session = get_session(&token, connection)?;

    Ok(session
        .filter(|session| session.is_valid_at(now))
        .map(|session| session.user_id))
}

/// End the session for `token` immediately.
///
/// Expiring an unknown or already expired token is not an error.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn expire_token(token: &str, now: OffsetDateTime, connection: &Connection) -> Result<(), Error> {
    expire_session(&SessionToken::new_unchecked(token), now, connection)
}


#[cfg(test)]
mod log_in_tests {
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{
        Error,
        auth::{
            SESSION_DURATION,
            service::{Registration, expire_token, is_valid_token, log_in, register, user_for_token},
            session::get_session,
        },
        db::initialize,
    };

    const T0: OffsetDateTime = datetime!(2025-06-01 12:00:00 UTC);

    fn get_db_connection_with_user() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        register(
            Registration {
                first_name: "Ada",
                last_name: "Lovelace",
                username: "ada",
                password: "hunter2",
                password_confirm: "hunter2",
            },
            4,
            &conn,
        )
        .unwrap();
        conn
    }

    #[test]
    fn log_in_returns_user_and_token() {
        let conn = get_db_connection_with_user();

        let logged_in = log_in("ada", "hunter2", "localhost", T0, &conn).unwrap();

        assert_eq!(logged_in.user.username, "ada");
        assert_eq!(logged_in.expires_at, T0 + SESSION_DURATION);
        let session = get_session(&logged_in.token, &conn).unwrap().unwrap();
        assert_eq!(session.user_id, logged_in.user.id);
        assert_eq!(session.hostname, "localhost");
        assert_eq!(session.expires_at, T0 + Duration::minutes(30));
    }

    #[test]
    fn log_in_with_wrong_password_is_unauthorized() {
        let conn = get_db_connection_with_user();

        let result = log_in("ada", "hunter3", "localhost", T0, &conn);

        assert_eq!(result, Err(Error::Unauthorized));
    }

    #[test]
    fn log_in_with_unknown_username_is_unauthorized() {
        let conn = get_db_connection_with_user();

        let result = log_in("grace", "hunter2", "localhost", T0, &conn);

        assert_eq!(result, Err(Error::Unauthorized));
    }

    #[test]
    fn fresh_token_is_valid() {
        let conn = get_db_connection_with_user();
        let logged_in = log_in("ada", "hunter2", "localhost", T0, &conn).unwrap();

        assert_eq!(
            is_valid_token(Some(logged_in.token.as_str()), T0, &conn),
            Ok(true)
        );
    }

    #[test]
    fn token_expires_after_thirty_minutes() {
        let conn = get_db_connection_with_user();
        let logged_in = log_in("ada", "hunter2", "localhost", T0, &conn).unwrap();
        let token = Some(logged_in.token.as_str());

        assert_eq!(
            is_valid_token(token, T0 + Duration::minutes(29), &conn),
            Ok(true)
        );
        assert_eq!(
            is_valid_token(token, T0 + Duration::minutes(31), &conn),
            Ok(false)
        );
    }

    #[test]
    fn missing_or_empty_token_is_invalid() {
        let conn = get_db_connection_with_user();

        assert_eq!(is_valid_token(None, T0, &conn), Ok(false));
        assert_eq!(is_valid_token(Some(""), T0, &conn), Ok(false));
    }

    #[test]
    fn expired_token_is_invalid() {
        let conn = get_db_connection_with_user();
        let logged_in = log_in("ada", "hunter2", "localhost", T0, &conn).unwrap();

        expire_token(logged_in.token.as_str(), T0 + Duration::minutes(1), &conn).unwrap();

        assert_eq!(
            is_valid_token(
                Some(logged_in.token.as_str()),
                T0 + Duration::minutes(2),
                &conn
            ),
            Ok(false)
        );
    }

    #[test]
    fn expire_unknown_token_succeeds() {
        let conn = get_db_connection_with_user();

        assert_eq!(expire_token("not-a-token", T0, &conn), Ok(()));
    }

    #[test]
    fn user_for_token_returns_session_owner() {
        let conn = get_db_connection_with_user();
        let logged_in = log_in("ada", "hunter2", "localhost", T0, &conn).unwrap();

        assert_eq!(
            user_for_token(Some(logged_in.token.as_str()), T0, &conn),
            Ok(Some(logged_in.user.id))
        );
    }
}
