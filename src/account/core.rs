//! Accounts, their types and categories, and account balances.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{Error, auth::UserID, transaction::read_amount};

pub type AccountId = i64;
pub type AccountTypeId = i64;

/// Which side of a transaction line increases an account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Debits increase the balance, e.g. assets and expenses.
    DebitNormal,
    /// Credits increase the balance, e.g. liabilities, equity and income.
    CreditNormal,
}

impl Direction {
    /// The amount by which a line with `debit` and `credit` changes the balance
    /// of an account with this direction.
    ///
    /// Returns `None` if the difference does not fit in a [Decimal].
    pub fn signed_amount(self, debit: Decimal, credit: Decimal) -> Option<Decimal> {
        match self {
            Direction::DebitNormal => debit.checked_sub(credit),
            Direction::CreditNormal => credit.checked_sub(debit),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Direction::DebitNormal => "debit",
            Direction::CreditNormal => "credit",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(Direction::DebitNormal),
            "credit" => Ok(Direction::CreditNormal),
            other => Err(format!("unknown account direction \"{other}\"")),
        }
    }
}

/// A top level grouping of accounts, e.g. "Asset" or "Income".
#[derive(Debug, Clone, PartialEq)]
pub struct AccountCategory {
    pub id: i64,
    pub name: String,
    pub direction: Direction,
}

/// A kind of account, e.g. "Checking" or "Credit Card".
#[derive(Debug, Clone, PartialEq)]
pub struct AccountType {
    pub id: AccountTypeId,
    pub name: String,
    pub category: AccountCategory,
}

/// An account in the ledger, owned by a single user.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The user that owns the account.
    pub user_id: UserID,
    /// The display name, unique per user.
    pub name: String,
    /// The account type, which determines the direction.
    pub account_type: AccountType,
}

impl Account {
    pub fn direction(&self) -> Direction {
        self.account_type.category.direction
    }
}

/// The categories created with the database, with their direction.
const SEED_CATEGORIES: [(&str, Direction); 5] = [
    ("Asset", Direction::DebitNormal),
    ("Expense", Direction::DebitNormal),
    ("Liability", Direction::CreditNormal),
    ("Equity", Direction::CreditNormal),
    ("Income", Direction::CreditNormal),
];

/// The account types created with the database, with the name of their category.
const SEED_ACCOUNT_TYPES: [(&str, &str); 14] = [
    ("Checking", "Asset"),
    ("Savings", "Asset"),
    ("Cash", "Asset"),
    ("Brokerage", "Asset"),
    ("Credit Card", "Liability"),
    ("Loan", "Liability"),
    ("Opening Balance", "Equity"),
    ("Salary", "Income"),
    ("Dividends", "Income"),
    ("Interest", "Income"),
    ("Groceries", "Expense"),
    ("Rent", "Expense"),
    ("Utilities", "Expense"),
    ("Fees", "Expense"),
];

/// Create the account category, account type and account tables.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_account_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account_category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            direction TEXT NOT NULL CHECK (direction IN ('debit', 'credit'))
        )",
        (),
    )?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS account_type (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            category_id INTEGER NOT NULL,
            FOREIGN KEY(category_id) REFERENCES account_category(id)
        )",
        (),
    )?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            account_type_id INTEGER NOT NULL,
            UNIQUE(user_id, name),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(account_type_id) REFERENCES account_type(id)
        )",
        (),
    )?;

    Ok(())
}

/// Insert the standard account categories and types if they are missing.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn seed_account_types(connection: &Connection) -> Result<(), rusqlite::Error> {
    let mut insert_category = connection.prepare(
        "INSERT OR IGNORE INTO account_category (name, direction) VALUES (?1, ?2)",
    )?;
    for (name, direction) in SEED_CATEGORIES {
        insert_category.execute((name, direction.as_str()))?;
    }

    let mut insert_type = connection.prepare(
        "INSERT OR IGNORE INTO account_type (name, category_id)
        SELECT ?1, id FROM account_category WHERE name = ?2",
    )?;
    for (name, category) in SEED_ACCOUNT_TYPES {
        insert_type.execute((name, category))?;
    }

    Ok(())
}

const SELECT_ACCOUNT: &str = "SELECT account.id, account.user_id, account.name,
        account_type.id, account_type.name,
        account_category.id, account_category.name, account_category.direction
    FROM account
    INNER JOIN account_type ON account_type.id = account.account_type_id
    INNER JOIN account_category ON account_category.id = account_type.category_id";

const SELECT_ACCOUNT_TYPE: &str = "SELECT account_type.id, account_type.name,
        account_category.id, account_category.name, account_category.direction
    FROM account_type
    INNER JOIN account_category ON account_category.id = account_type.category_id";

fn map_account_type_row(row: &Row, offset: usize) -> Result<AccountType, rusqlite::Error> {
    let raw_direction: String = row.get(offset + 4)?;
    let direction = raw_direction.parse().map_err(|error: String| {
        rusqlite::Error::FromSqlConversionFailure(
            offset + 4,
            rusqlite::types::Type::Text,
            error.into(),
        )
    })?;

    Ok(AccountType {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        category: AccountCategory {
            id: row.get(offset + 2)?,
            name: row.get(offset + 3)?,
            direction,
        },
    })
}

fn map_account_row(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        account_type: map_account_type_row(row, 3)?,
    })
}

/// Create a new account for `user_id`.
///
/// # Errors
///
/// Returns a:
/// - [Error::InvalidInput] if `name` is empty or the user already has an account with that name,
/// - [Error::NotFound] if `account_type_id` does not refer to an account type,
/// - or [Error::SqlError] if an SQL related error occurred.
pub fn create_account(
    user_id: UserID,
    name: &str,
    account_type_id: AccountTypeId,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::InvalidInput("Account name cannot be empty".to_owned()));
    }

    get_account_type(account_type_id, connection)?;

    connection
        .execute(
            "INSERT INTO account (user_id, name, account_type_id) VALUES (?1, ?2, ?3)",
            (user_id.as_i64(), name, account_type_id),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(error, Some(_))
                if error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Error::InvalidInput(format!("An account named \"{name}\" already exists"))
            }
            error => error.into(),
        })?;

    get_account(connection.last_insert_rowid(), connection)?.ok_or(Error::NotFound)
}

/// Get an account by its ID, or `None` if there is no account with `account_id`.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_account(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Option<Account>, Error> {
    connection
        .prepare(&format!("{SELECT_ACCOUNT} WHERE account.id = :id"))?
        .query_row(&[(":id", &account_id)], map_account_row)
        .optional()
        .map_err(Error::from)
}

/// Get the accounts owned by `user_id`, ordered by name.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_accounts(user_id: UserID, connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_ACCOUNT} WHERE account.user_id = :user_id ORDER BY account.name, account.id"
        ))?
        .query_map(&[(":user_id", &user_id.as_i64())], map_account_row)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Get an account type by its ID.
///
/// # Errors
///
/// Returns a [Error::NotFound] if there is no account type with `account_type_id`,
/// or [Error::SqlError] if an SQL related error occurred.
pub fn get_account_type(
    account_type_id: AccountTypeId,
    connection: &Connection,
) -> Result<AccountType, Error> {
    connection
        .prepare(&format!("{SELECT_ACCOUNT_TYPE} WHERE account_type.id = :id"))?
        .query_row(&[(":id", &account_type_id)], |row| {
            map_account_type_row(row, 0)
        })
        .map_err(|error| error.into())
}

/// Get every account type, grouped by category.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_account_types(connection: &Connection) -> Result<Vec<AccountType>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_ACCOUNT_TYPE} ORDER BY account_category.id, account_type.id"
        ))?
        .query_map([], |row| map_account_type_row(row, 0))?
        .map(|maybe_type| maybe_type.map_err(Error::from))
        .collect()
}

/// Get the balance of an account: the signed sum of every transaction line on it.
///
/// # Errors
///
/// Returns a:
/// - [Error::NotFound] if there is no account with `account_id`,
/// - [Error::BalanceOverflow] if the balance does not fit in a [Decimal],
/// - or [Error::SqlError] if an SQL related error occurred.
pub fn get_balance_for_account(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let direction = get_account(account_id, connection)?
        .ok_or(Error::NotFound)?
        .direction();

    let mut statement = connection.prepare(
        "SELECT debit, credit FROM transaction_line WHERE account_id = :account_id ORDER BY id",
    )?;
    let lines = statement.query_map(&[(":account_id", &account_id)], |row| {
        Ok((read_amount(row, 0)?, read_amount(row, 1)?))
    })?;

    let mut balance = Decimal::ZERO;
    for line in lines {
        let (debit, credit) = line?;
        balance = direction
            .signed_amount(debit, credit)
            .and_then(|amount| balance.checked_add(amount))
            .ok_or(Error::BalanceOverflow(account_id))?;
    }

    Ok(balance)
}
