use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    AppState, Error,
    account::{AccountId, Direction, get_accounts, get_balance_for_account},
    auth::UserID,
};

/// The state needed to list account balances.
#[derive(Debug, Clone)]
pub struct AccountBalancesState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountBalancesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// An account and its current balance as sent to API clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalance {
    pub id: AccountId,
    pub name: String,
    pub account_type: String,
    pub direction: Direction,
    /// Serialized as a string so that no precision is lost.
    pub balance: Decimal,
}

/// A route handler that lists the user's accounts with their balances as JSON.
pub async fn get_account_balances(
    State(state): State<AccountBalancesState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<AccountBalance>>, Error> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("Could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let balances = get_accounts(user_id, &connection)?
        .into_iter()
        .map(|account| {
            let balance = get_balance_for_account(account.id, &connection)?;

            Ok(AccountBalance {
                id: account.id,
                direction: account.direction(),
                name: account.name,
                account_type: account.account_type.name,
                balance,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(Json(balances))
}
