//! The double-entry ledger.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` and `TransactionLine` models and the `Transfer` used to record one
//! - Database functions for recording, querying and removing transactions
//! - The running balance shown for each account
//! - View handlers for the transactions page and its transfer and delete endpoints

mod amount;
mod core;
mod delete_endpoint;
mod running_balance;
mod transactions_page;
mod transfer_endpoint;

pub use amount::parse_amount;
pub(crate) use amount::read_amount;
pub use core::{
    Transaction, TransactionId, TransactionLine, TransactionLineId, TransactionType,
    TransactionTypeId, Transfer, create_transaction_tables, create_transfer, get_transaction,
    get_transaction_type, get_transaction_types, get_transactions, remove_transaction,
    seed_transaction_types,
};
pub use delete_endpoint::delete_transaction_endpoint;
pub use running_balance::{AccountTransactionRow, account_transaction_rows};
pub use transactions_page::get_transactions_page;
pub use transfer_endpoint::create_transfer_endpoint;
