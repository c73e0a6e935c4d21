//! Defines the app level error type and conversions to rendered HTML pages and plain-text responses.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    account::AccountId, endpoints, html::error_view, internal_server_error::InternalServerError,
    not_found::get_404_not_found_response,
};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request data was malformed or contradictory, e.g. mismatched
    /// passwords or a non-positive transfer amount.
    ///
    /// The string explains the problem and is safe to show to the client.
    #[error("{0}")]
    InvalidInput(String),

    /// Tried to register a username that already belongs to another user.
    #[error("the username \"{0}\" is already taken")]
    DuplicateUser(String),

    /// The username and password did not match a registered user, or the
    /// request did not carry a valid session.
    #[error("invalid username or password")]
    Unauthorized,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    #[error("the requested item could not be found")]
    NotFound,

    /// The balance of an account, or one of its running balances, does not
    /// fit in a [rust_decimal::Decimal].
    #[error("the balance of account {0} is too large to be represented")]
    BalanceOverflow(AccountId),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => get_404_not_found_response(),
            Error::Unauthorized => Redirect::to(endpoints::LOG_IN_VIEW).into_response(),
            Error::InvalidInput(message) => (
                StatusCode::BAD_REQUEST,
                error_view("Bad Request", "400", "Invalid request", &message),
            )
                .into_response(),
            Error::InvalidTimezoneError(timezone) => InternalServerError {
                description: "Invalid Timezone Settings",
                fix: &format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            }
            .into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    /// Respond with the error message as a plain-text body.
    ///
    /// Invalid input is reported as 400 Bad Request, everything else as
    /// 500 Internal Server Error.
    pub(crate) fn into_plain_text_response(self) -> Response {
        let status_code = match self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod error_response_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{Error, endpoints};

    #[test]
    fn not_found_renders_404() {
        let response = Error::NotFound.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_redirects_to_log_in() {
        let response = Error::Unauthorized.into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            endpoints::LOG_IN_VIEW
        );
    }

    #[test]
    fn invalid_input_is_bad_request() {
        let response = Error::InvalidInput("nope".to_owned()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn plain_text_response_uses_500_for_ledger_failures() {
        let response = Error::NotFound.into_plain_text_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn plain_text_response_uses_400_for_invalid_input() {
        let response = Error::InvalidInput("amount must be positive".to_owned())
            .into_plain_text_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn query_returned_no_rows_maps_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }
}
