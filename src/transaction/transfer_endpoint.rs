//! Defines the endpoint for recording a transfer between two accounts.
use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRefresh;
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, macros::format_description};

use crate::{
    AppState, Error,
    account::{AccountId, get_account},
    auth::UserID,
    transaction::{Transfer, TransactionTypeId, create_transfer, parse_amount},
};

/// The state needed to record a transfer.
#[derive(Debug, Clone)]
pub struct TransferState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransferState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The raw form data for a transfer.
///
/// Every field is kept as text so that missing or malformed values can be
/// reported with a useful message instead of a generic rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferForm {
    pub debit_account_id: Option<String>,
    pub credit_account_id: Option<String>,
    pub transaction_type_id: Option<String>,
    pub transaction_date: Option<String>,
    pub amount: Option<String>,
    pub description: Option<String>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, Error> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::InvalidInput(format!("Missing required field {name}")))
}

fn parse_id(value: &Option<String>, name: &str) -> Result<i64, Error> {
    let raw = required(value, name)?;

    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("{name} must be a number, got \"{raw}\"")))
}

fn parse_date(value: &Option<String>) -> Result<Date, Error> {
    let raw = required(value, "transactionDate")?;

    Date::parse(raw, format_description!("[year]-[month]-[day]")).map_err(|_| {
        Error::InvalidInput(format!(
            "transactionDate must be a date in the format YYYY-MM-DD, got \"{raw}\""
        ))
    })
}

impl TransferForm {
    /// Check the form and convert it into a [Transfer].
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidInput] if a field is missing or malformed.
    pub fn validate(&self) -> Result<Transfer, Error> {
        let debit_account_id: AccountId = parse_id(&self.debit_account_id, "debitAccountId")?;
        let credit_account_id: AccountId = parse_id(&self.credit_account_id, "creditAccountId")?;
        let transaction_type_id: TransactionTypeId =
            parse_id(&self.transaction_type_id, "transactionTypeId")?;
        let date = parse_date(&self.transaction_date)?;
        let amount = parse_amount(required(&self.amount, "amount")?)?;
        let description = required(&self.description, "description")?.to_owned();

        Ok(Transfer {
            debit_account_id,
            credit_account_id,
            transaction_type_id,
            date,
            amount,
            description,
        })
    }
}

/// A route handler for recording a transfer.
///
/// Responds with 200 and asks HTMX to refresh the page on success, 400 with a
/// plain-text message if the form is invalid, and 500 with the error message
/// if the ledger could not record the transfer.
pub async fn create_transfer_endpoint(
    State(state): State<TransferState>,
    Extension(user_id): Extension<UserID>,
    Form(form): Form<TransferForm>,
) -> Response {
    let transfer = match form.validate() {
        Ok(transfer) => transfer,
        Err(error) => return error.into_plain_text_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_plain_text_response();
        }
    };

    // Accounts that belong to another user are treated as missing.
    for account_id in [transfer.debit_account_id, transfer.credit_account_id] {
        match get_account(account_id, &connection) {
            Ok(Some(account)) if account.user_id == user_id => {}
            Ok(_) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, Error::NotFound.to_string())
                    .into_response();
            }
            Err(error) => return error.into_plain_text_response(),
        }
    }

    match create_transfer(transfer, &connection) {
        Ok(transaction) => {
            tracing::info!("User {user_id} recorded transaction {}", transaction.id);
            (StatusCode::OK, HxRefresh(true), ()).into_response()
        }
        Err(error) => {
            tracing::error!("Could not record transfer: {error}");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}
