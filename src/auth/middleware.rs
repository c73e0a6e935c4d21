//! Authentication middleware that resolves the session cookie to a user and handles redirects.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState,
    auth::{
        cookie::get_token_from_cookies, redirect::build_log_in_redirect_url,
        service::user_for_token,
    },
};

/// The state needed for the auth middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The database connection holding the session table.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Middleware function that checks for a valid session cookie.
/// The user ID is placed into request and then the request executed normally if the session is valid,
/// otherwise a redirect to the log-in page is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let log_in_redirect_url = build_log_in_redirect_url(&request);

    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}. Redirecting to log in page.");
            return Redirect::to(&log_in_redirect_url).into_response();
        }
    };

    let Some(token) = get_token_from_cookies(&jar) else {
        return Redirect::to(&log_in_redirect_url).into_response();
    };

    let user_id = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("Could not acquire database lock: {error}");
                return crate::Error::DatabaseLockError.into_response();
            }
        };

        match user_for_token(Some(&token), OffsetDateTime::now_utc(), &connection) {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                tracing::debug!("Session token is unknown or expired. Redirecting to log in page.");
                return Redirect::to(&log_in_redirect_url).into_response();
            }
            Err(error) => return error.into_response(),
        }
    };

    parts.extensions.insert(user_id);
    let request = Request::from_parts(parts, body);

    next.run(request).await
}

#[cfg(test)]
mod auth_guard_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Router,
        extract::State,
        middleware,
        routing::{get, post},
    };
    use axum_extra::extract::{
        PrivateCookieJar,
        cookie::{Cookie, Key},
    };
    use axum_test::TestServer;
    use rusqlite::Connection;
    use sha2::Digest;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        auth::{
            AuthState, UserID, auth_guard,
            cookie::{COOKIE_TOKEN, set_session_cookie},
            service::{Registration, log_in, register},
        },
        db::initialize,
        endpoints,
    };

    async fn test_handler(Extension(user_id): Extension<UserID>) -> String {
        user_id.to_string()
    }

    async fn stub_log_in_route(
        State(state): State<AuthState>,
        jar: PrivateCookieJar,
    ) -> Result<PrivateCookieJar, Error> {
        let connection = state.db_connection.lock().unwrap();
        let logged_in = log_in(
            "ada",
            "hunter2",
            "localhost",
            OffsetDateTime::now_utc(),
            &connection,
        )?;

        Ok(set_session_cookie(
            jar,
            &logged_in.token,
            logged_in.expires_at,
        ))
    }

    const TEST_LOG_IN_ROUTE: &str = "/log_in";
    const TEST_PROTECTED_ROUTE: &str = "/protected";

    fn get_test_server() -> (TestServer, AuthState) {
        let hash = sha2::Sha512::digest("nafstenoas");
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        register(
            Registration {
                first_name: "Ada",
                last_name: "Lovelace",
                username: "ada",
                password: "hunter2",
                password_confirm: "hunter2",
            },
            4,
            &connection,
        )
        .unwrap();

        let state = AuthState {
            cookie_key: Key::from(&hash),
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let app = Router::new()
            .route(TEST_PROTECTED_ROUTE, get(test_handler))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .route(TEST_LOG_IN_ROUTE, post(stub_log_in_route))
            .with_state(state.clone());

        (
            TestServer::try_new(app).expect("Could not create test server."),
            state,
        )
    }

    fn expected_redirect() -> String {
        endpoints::with_query(endpoints::LOG_IN_VIEW, "redirect_url", TEST_PROTECTED_ROUTE)
    }

    #[tokio::test]
    async fn get_protected_route_with_valid_cookie() {
        let (server, _) = get_test_server();
        let response = server.post(TEST_LOG_IN_ROUTE).await;

        response.assert_status_ok();
        let token_cookie = response.cookie(COOKIE_TOKEN);

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(token_cookie)
            .await;

        response.assert_status_ok();
        response.assert_text("1");
    }

    #[tokio::test]
    async fn get_protected_route_with_no_cookie_redirects_to_log_in() {
        let (server, _) = get_test_server();
        let response = server.get(TEST_PROTECTED_ROUTE).await;

        response.assert_status_see_other();
        assert_eq!(response.header("location"), expected_redirect());
    }

    #[tokio::test]
    async fn get_protected_route_with_invalid_cookie_redirects_to_log_in() {
        let (server, _) = get_test_server();
        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(Cookie::build((COOKIE_TOKEN, "FOOBAR")).build())
            .await;

        response.assert_status_see_other();
        assert_eq!(response.header("location"), expected_redirect());
    }

    #[tokio::test]
    async fn get_protected_route_with_expired_session_redirects_to_log_in() {
        let (server, state) = get_test_server();
        let response = server.post(TEST_LOG_IN_ROUTE).await;
        let token_cookie = response.cookie(COOKIE_TOKEN);

        // The cookie value seen by the client is encrypted, so expire every session directly.
        state
            .db_connection
            .lock()
            .unwrap()
            .execute(
                "UPDATE session SET expires_at = ?1",
                (OffsetDateTime::now_utc() - Duration::seconds(1),),
            )
            .unwrap();

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(token_cookie)
            .await;

        response.assert_status_see_other();
        assert_eq!(response.header("location"), expected_redirect());
    }
}
