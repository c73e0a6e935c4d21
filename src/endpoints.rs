//! The API endpoints URIs.
//!
//! For endpoints that take a query parameter, e.g., '/transactions?accountId=1', use [with_query].

/// The root route which redirects to the transactions page.
pub const ROOT: &str = "/";
/// The page for displaying an account's transactions.
pub const TRANSACTIONS_VIEW: &str = "/transactions";
/// The same page as [TRANSACTIONS_VIEW] with a trailing slash.
pub const TRANSACTIONS_VIEW_SLASH: &str = "/transactions/";
/// The route for creating a transfer between two accounts.
pub const TRANSFER: &str = "/transactions/transfer";
/// The route for deleting a transaction.
pub const DELETE_TRANSACTION: &str = "/transactions/delete";
/// The route for creating an account.
pub const ACCOUNTS: &str = "/accounts";
/// The route for listing accounts and their balances as JSON.
pub const ACCOUNTS_API: &str = "/api/accounts";
/// The route for getting the log in page and for logging in.
pub const LOG_IN_VIEW: &str = "/auth/login";
/// The route for getting the registration page and for registering.
pub const REGISTER_VIEW: &str = "/auth/register";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/auth/logout";
/// The route for static files.
pub const STATIC: &str = "/static";

/// Append a single query parameter to `endpoint_path`, URL encoding the value.
pub fn with_query(endpoint_path: &str, key: &str, value: impl ToString) -> String {
    match serde_urlencoded::to_string([(key, value.to_string())]) {
        Ok(query) => format!("{endpoint_path}?{query}"),
        Err(error) => {
            tracing::error!("Could not encode query parameter {key}: {error}");
            endpoint_path.to_owned()
        }
    }
}
