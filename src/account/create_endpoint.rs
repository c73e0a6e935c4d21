//! Defines the endpoint for creating a new account.
use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    response::{IntoResponse, Redirect, Response},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    account::{AccountTypeId, create_account},
    auth::UserID,
    endpoints::{self, with_query},
};

/// The state needed to create an account.
#[derive(Debug, Clone)]
pub struct CreateAccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateAccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The form data for creating an account.
#[derive(Debug, Deserialize)]
pub struct AccountForm {
    /// The display name of the account, unique per user.
    pub name: String,
    /// The ID of the account type, kept as text so a bad value gives a 400.
    #[serde(rename = "accountTypeId")]
    pub account_type_id: String,
}

/// A route handler for creating a new account.
///
/// Redirects to the transactions page for the new account on success.
pub async fn create_account_endpoint(
    State(state): State<CreateAccountState>,
    Extension(user_id): Extension<UserID>,
    Form(form): Form<AccountForm>,
) -> Result<Response, Error> {
    let account_type_id: AccountTypeId = form.account_type_id.trim().parse().map_err(|_| {
        Error::InvalidInput(format!(
            "accountTypeId must be a number, got \"{}\"",
            form.account_type_id
        ))
    })?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("Could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let account = match create_account(user_id, &form.name, account_type_id, &connection) {
        Ok(account) => account,
        Err(Error::NotFound) => {
            return Err(Error::InvalidInput(format!(
                "There is no account type with the ID {account_type_id}"
            )));
        }
        Err(error) => {
            tracing::error!("Could not create account {form:?}: {error}");
            return Err(error);
        }
    };

    tracing::info!("User {user_id} created account {}", account.id);

    let redirect_url = with_query(endpoints::TRANSACTIONS_VIEW, "accountId", account.id);

    Ok(Redirect::to(&redirect_url).into_response())
}

#[cfg(test)]
mod create_account_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Form,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
    };

    use crate::{
        account::get_accounts,
        auth::UserID,
        test_utils::{account_type_id, create_test_user, get_header},
    };

    use super::{AccountForm, CreateAccountState, create_account_endpoint};

    fn get_state() -> (CreateAccountState, UserID, i64) {
        let (conn, user_id) = create_test_user();
        let savings = account_type_id("Savings", &conn);

        let state = CreateAccountState {
            db_connection: Arc::new(Mutex::new(conn)),
        };

        (state, user_id, savings)
    }

    async fn post(
        state: &CreateAccountState,
        user_id: UserID,
        name: &str,
        type_id: &str,
    ) -> Response {
        create_account_endpoint(
            State(state.clone()),
            Extension(user_id),
            Form(AccountForm {
                name: name.to_owned(),
                account_type_id: type_id.to_owned(),
            }),
        )
        .await
        .into_response()
    }

    #[tokio::test]
    async fn redirects_to_new_account() {
        let (state, user_id, savings) = get_state();

        let response = post(&state, user_id, "Rainy day", &savings.to_string()).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let connection = state.db_connection.lock().unwrap();
        let accounts = get_accounts(user_id, &connection).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Rainy day");
        assert_eq!(
            get_header(&response, "location"),
            format!("/transactions?accountId={}", accounts[0].id)
        );
    }

    #[tokio::test]
    async fn empty_name_is_bad_request() {
        let (state, user_id, savings) = get_state();

        let response = post(&state, user_id, "   ", &savings.to_string()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_numeric_type_is_bad_request() {
        let (state, user_id, _) = get_state();

        let response = post(&state, user_id, "Rainy day", "savings").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_type_is_bad_request() {
        let (state, user_id, _) = get_state();

        let response = post(&state, user_id, "Rainy day", "999").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let connection = state.db_connection.lock().unwrap();
        assert!(get_accounts(user_id, &connection).unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_name_is_bad_request() {
        let (state, user_id, savings) = get_state();
        post(&state, user_id, "Rainy day", &savings.to_string()).await;

        let response = post(&state, user_id, "Rainy day", &savings.to_string()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
