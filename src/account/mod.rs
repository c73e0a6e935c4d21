//! Ledger accounts, their types and categories, and their balances.

mod balances_endpoint;
mod core;
mod create_endpoint;

pub use balances_endpoint::{AccountBalance, get_account_balances};
pub use core::{
    Account, AccountCategory, AccountId, AccountType, AccountTypeId, Direction,
    create_account, create_account_tables, get_account, get_account_type, get_account_types,
    get_accounts, get_balance_for_account, seed_account_types,
};
pub use create_endpoint::create_account_endpoint;
