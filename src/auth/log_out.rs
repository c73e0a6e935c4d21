//! Log-out route handler that ends the session, clears the session cookie and redirects users.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use time::OffsetDateTime;

use crate::{
    auth::{
        AuthState,
        cookie::{get_token_from_cookies, invalidate_session_cookie},
        service::expire_token,
    },
    endpoints,
};

/// Expire the current session, invalidate the session cookie and redirect the client to the log-in page.
///
/// Logging out without a session, or with one that has already expired, still clears the cookie.
pub async fn get_log_out(State(state): State<AuthState>, jar: PrivateCookieJar) -> Response {
    if let Some(token) = get_token_from_cookies(&jar) {
        match state.db_connection.lock() {
            Ok(connection) => {
                if let Err(error) = expire_token(&token, OffsetDateTime::now_utc(), &connection) {
                    tracing::error!("Could not expire session during log out: {error}");
                }
            }
            Err(error) => tracing::error!("Could not acquire database lock: {error}"),
        }
    }

    let jar = invalidate_session_cookie(jar);

    (jar, Redirect::to(endpoints::LOG_IN_VIEW)).into_response()
}
