use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRefresh;
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    account::get_account,
    auth::UserID,
    transaction::{TransactionId, get_transaction, remove_transaction},
};

/// The state needed to delete a transaction.
#[derive(Debug, Clone)]
pub struct DeleteTransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteTransactionQuery {
    #[serde(rename = "transactionId")]
    pub transaction_id: Option<String>,
}

fn parse_transaction_id(raw: Option<&str>) -> Result<TransactionId, Error> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| Error::InvalidInput("Missing required field transactionId".to_owned()))?;

    raw.parse().map_err(|_| {
        Error::InvalidInput(format!("transactionId must be a number, got \"{raw}\""))
    })
}

/// Check that every line of the transaction is on one of the user's accounts.
fn check_owner(
    transaction_id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = get_transaction(transaction_id, connection)?.ok_or(Error::NotFound)?;

    for line in &transaction.lines {
        match get_account(line.account_id, connection)? {
            Some(account) if account.user_id == user_id => {}
            _ => return Err(Error::NotFound),
        }
    }

    Ok(())
}

/// A route handler for deleting a transaction and its lines.
///
/// Responds with 400 if the transaction ID is missing or not a number, 500
/// with the error message if the transaction could not be deleted, and 200
/// with a request for HTMX to refresh the page otherwise.
pub async fn delete_transaction_endpoint(
    State(state): State<DeleteTransactionState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<DeleteTransactionQuery>,
) -> Response {
    let transaction_id = match parse_transaction_id(query.transaction_id.as_deref()) {
        Ok(transaction_id) => transaction_id,
        Err(error) => return error.into_plain_text_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_plain_text_response();
        }
    };

    let result = check_owner(transaction_id, user_id, &connection)
        .and_then(|_| remove_transaction(transaction_id, &connection));

    match result {
        Ok(()) => {
            tracing::info!("User {user_id} deleted transaction {transaction_id}");
            (StatusCode::OK, HxRefresh(true), ()).into_response()
        }
        Err(error) => {
            tracing::error!("Could not delete transaction {transaction_id}: {error}");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}
