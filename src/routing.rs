//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    response::Redirect,
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    account::{create_account_endpoint, get_account_balances},
    auth::{auth_guard, get_log_in_page, get_log_out, get_register_page, post_log_in, register_user},
    endpoints,
    not_found::get_404_not_found,
    transaction::{create_transfer_endpoint, delete_transaction_endpoint, get_transactions_page},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(
            endpoints::LOG_IN_VIEW,
            get(get_log_in_page).post(post_log_in),
        )
        .route(
            endpoints::REGISTER_VIEW,
            get(get_register_page).post(register_user),
        )
        .route(endpoints::LOG_OUT, get(get_log_out));

    let protected_routes = Router::new()
        .route(endpoints::TRANSACTIONS_VIEW, get(get_transactions_page))
        .route(endpoints::TRANSACTIONS_VIEW_SLASH, get(get_transactions_page))
        .route(endpoints::TRANSFER, post(create_transfer_endpoint))
        .route(
            endpoints::DELETE_TRANSACTION,
            get(delete_transaction_endpoint),
        )
        .route(endpoints::ACCOUNTS, post(create_account_endpoint))
        .route(endpoints::ACCOUNTS_API, get(get_account_balances))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The root path '/' redirects to the transactions page.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::TRANSACTIONS_VIEW)
}


#[cfg(test)]
mod router_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{AppState, endpoints};

    use super::build_router;

    fn get_test_server() -> TestServer {
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "nafstenoas",
            "Etc/UTC",
        )
        .unwrap();

        let mut server = TestServer::try_new(build_router(state)).expect("Could not create test server.");
        server.save_cookies();
        server
    }

    #[tokio::test]
    async fn protected_routes_redirect_to_log_in() {
        let server = get_test_server();

        for path in [
            endpoints::TRANSACTIONS_VIEW,
            endpoints::TRANSACTIONS_VIEW_SLASH,
            endpoints::ACCOUNTS_API,
            endpoints::DELETE_TRANSACTION,
        ] {
            let response = server.get(path).await;

            response.assert_status(StatusCode::SEE_OTHER);
            let location = response.header("location");
            assert!(
                location
                    .to_str()
                    .unwrap()
                    .starts_with(endpoints::LOG_IN_VIEW),
                "{path} redirected to {location:?}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = get_test_server();

        server
            .get("/not-a-real-page")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn register_then_use_ledger() {
        let server = get_test_server();

        server
            .post(endpoints::REGISTER_VIEW)
            .form(&[
                ("first_name", "Ada"),
                ("last_name", "Lovelace"),
                ("username", "ada"),
                ("password", "hunter2"),
                ("confirm_password", "hunter2"),
            ])
            .await
            .assert_status(StatusCode::SEE_OTHER);

        let response = server.get(endpoints::ACCOUNTS_API).await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!([]));

        // The first type is "Checking" in the "Asset" category.
        server
            .post(endpoints::ACCOUNTS)
            .form(&[("name", "Everyday"), ("accountTypeId", "1")])
            .await
            .assert_status(StatusCode::SEE_OTHER);

        let response = server.get(endpoints::ACCOUNTS_API).await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!([{
            "id": 1,
            "name": "Everyday",
            "account_type": "Checking",
            "direction": "debit_normal",
            "balance": "0",
        }]));

        server
            .get(endpoints::LOG_OUT)
            .await
            .assert_status(StatusCode::SEE_OTHER);

        server
            .get(endpoints::ACCOUNTS_API)
            .await
            .assert_status(StatusCode::SEE_OTHER);
    }
}
