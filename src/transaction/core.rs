//! Double-entry transactions: a dated, typed record made up of balanced debit and credit lines.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use time::Date;

use crate::{
    Error,
    account::{AccountId, get_account, get_balance_for_account},
    transaction::{amount::read_amount, running_balance::account_transaction_rows},
};

pub type TransactionId = i64;
pub type TransactionTypeId = i64;
pub type TransactionLineId = i64;

/// What kind of event a transaction records, e.g. "Deposit" or "Dividend".
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionType {
    pub id: TransactionTypeId,
    pub name: String,
}

/// One side of a transaction: an amount debited or credited to a single account.
///
/// Usually only one of `debit` and `credit` is non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionLine {
    pub id: TransactionLineId,
    pub account_id: AccountId,
    pub debit: Decimal,
    pub credit: Decimal,
}

/// A balanced set of transaction lines recorded on a date.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: Date,
    pub transaction_type: TransactionType,
    pub description: String,
    /// The lines in the order they were created.
    pub lines: Vec<TransactionLine>,
}

impl Transaction {
    /// Whether the total debits equal the total credits.
    ///
    /// A transaction whose totals do not fit in a [Decimal] is never balanced.
    pub fn is_balanced(&self) -> bool {
        let debits = checked_total(self.lines.iter().map(|line| line.debit));
        let credits = checked_total(self.lines.iter().map(|line| line.credit));

        matches!((debits, credits), (Some(debits), Some(credits)) if debits == credits)
    }
}

fn checked_total(amounts: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    amounts.fold(Some(Decimal::ZERO), |total, amount| total?.checked_add(amount))
}

/// The details for moving `amount` from `credit_account_id` to `debit_account_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub debit_account_id: AccountId,
    pub credit_account_id: AccountId,
    pub transaction_type_id: TransactionTypeId,
    pub date: Date,
    pub amount: Decimal,
    pub description: String,
}

const SEED_TRANSACTION_TYPES: [&str; 7] = [
    "Transfer",
    "Deposit",
    "Withdrawal",
    "Purchase",
    "Sale",
    "Dividend",
    "Fee",
];

/// Create the transaction type, transaction and transaction line tables in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transaction_type (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
                )",
        (),
    )?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                transaction_type_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                FOREIGN KEY(transaction_type_id) REFERENCES transaction_type(id)
                )",
        (),
    )?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS transaction_line (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                transaction_id INTEGER NOT NULL,
                account_id INTEGER NOT NULL,
                debit TEXT NOT NULL,
                credit TEXT NOT NULL,
                FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id) ON DELETE CASCADE,
                FOREIGN KEY(account_id) REFERENCES account(id) ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_line_account ON transaction_line(account_id);",
        (),
    )?;

    Ok(())
}

/// Insert the standard transaction types if they are missing.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn seed_transaction_types(connection: &Connection) -> Result<(), rusqlite::Error> {
    let mut statement =
        connection.prepare("INSERT OR IGNORE INTO transaction_type (name) VALUES (?1)")?;

    for name in SEED_TRANSACTION_TYPES {
        statement.execute((name,))?;
    }

    Ok(())
}

/// Get every transaction type.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_transaction_types(connection: &Connection) -> Result<Vec<TransactionType>, Error> {
    connection
        .prepare("SELECT id, name FROM transaction_type ORDER BY id")?
        .query_map([], map_transaction_type_row)?
        .map(|maybe_type| maybe_type.map_err(Error::from))
        .collect()
}

/// Get a transaction type by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction type,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction_type(
    id: TransactionTypeId,
    connection: &Connection,
) -> Result<TransactionType, Error> {
    connection
        .prepare("SELECT id, name FROM transaction_type WHERE id = :id")?
        .query_row(&[(":id", &id)], map_transaction_type_row)
        .map_err(|error| error.into())
}

fn map_transaction_type_row(row: &Row) -> Result<TransactionType, rusqlite::Error> {
    Ok(TransactionType {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

/// Record a transfer as a transaction with one debit line and one credit line for the same amount.
///
/// The transaction and both lines are written in a single SQLite transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidInput] if the amount is not greater than zero or would make
///   either account's balance too large to represent,
/// - [Error::NotFound] if either account or the transaction type does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transfer(transfer: Transfer, connection: &Connection) -> Result<Transaction, Error> {
    if transfer.amount <= Decimal::ZERO {
        return Err(Error::InvalidInput(
            "Amount must be greater than zero".to_owned(),
        ));
    }

    get_account(transfer.debit_account_id, connection)?.ok_or(Error::NotFound)?;
    get_account(transfer.credit_account_id, connection)?.ok_or(Error::NotFound)?;
    get_transaction_type(transfer.transaction_type_id, connection)?;

    let sql_transaction = connection.unchecked_transaction()?;

    let transaction_id: TransactionId = sql_transaction
        .prepare(
            "INSERT INTO \"transaction\" (date, transaction_type_id, description)
             VALUES (?1, ?2, ?3)
             RETURNING id",
        )?
        .query_row(
            (
                transfer.date,
                transfer.transaction_type_id,
                transfer.description.trim(),
            ),
            |row| row.get(0),
        )?;

    let amount = transfer.amount.to_string();
    let zero = Decimal::ZERO.to_string();
    {
        let mut insert_line = sql_transaction.prepare(
            "INSERT INTO transaction_line (transaction_id, account_id, debit, credit)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        insert_line.execute((transaction_id, transfer.debit_account_id, &amount, &zero))?;
        insert_line.execute((transaction_id, transfer.credit_account_id, &zero, &amount))?;
    }

    // Dropping the SQL transaction on error rolls back the new lines.
    check_balances_in_range(
        &[transfer.debit_account_id, transfer.credit_account_id],
        &sql_transaction,
    )?;

    sql_transaction.commit()?;

    tracing::debug!(
        "Created transaction {transaction_id}: {} from account {} to account {}",
        transfer.amount,
        transfer.credit_account_id,
        transfer.debit_account_id
    );

    get_transaction(transaction_id, connection)?.ok_or(Error::NotFound)
}

/// Check that the balance and every running balance of each account fit in a [Decimal].
fn check_balances_in_range(
    account_ids: &[AccountId],
    connection: &Connection,
) -> Result<(), Error> {
    for &account_id in account_ids {
        let account = get_account(account_id, connection)?.ok_or(Error::NotFound)?;
        let transactions = get_transactions(account_id, connection)?;

        let result = get_balance_for_account(account_id, connection).and_then(|_| {
            account_transaction_rows(&account, &transactions, &HashMap::new()).map(|_| ())
        });

        match result {
            Err(Error::BalanceOverflow(_)) => {
                return Err(Error::InvalidInput(format!(
                    "The balance of {} would be too large to represent",
                    account.name
                )));
            }
            other => other?,
        }
    }

    Ok(())
}

const SELECT_TRANSACTION: &str = "SELECT \"transaction\".id, \"transaction\".date,
        transaction_type.id, transaction_type.name, \"transaction\".description
    FROM \"transaction\"
    INNER JOIN transaction_type ON transaction_type.id = \"transaction\".transaction_type_id";

fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        date: row.get(1)?,
        transaction_type: TransactionType {
            id: row.get(2)?,
            name: row.get(3)?,
        },
        description: row.get(4)?,
        lines: Vec::new(),
    })
}

fn map_line_row(row: &Row) -> Result<(TransactionId, TransactionLine), rusqlite::Error> {
    Ok((
        row.get(0)?,
        TransactionLine {
            id: row.get(1)?,
            account_id: row.get(2)?,
            debit: read_amount(row, 3)?,
            credit: read_amount(row, 4)?,
        },
    ))
}

/// Retrieve a transaction and its lines from the database by its `id`, or
/// `None` if `id` does not refer to a transaction.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<Option<Transaction>, Error> {
    let Some(mut transaction) = connection
        .prepare(&format!("{SELECT_TRANSACTION} WHERE \"transaction\".id = :id"))?
        .query_row(&[(":id", &id)], map_transaction_row)
        .optional()?
    else {
        return Ok(None);
    };

    transaction.lines = connection
        .prepare(
            "SELECT transaction_id, id, account_id, debit, credit
             FROM transaction_line WHERE transaction_id = :id ORDER BY id",
        )?
        .query_map(&[(":id", &id)], map_line_row)?
        .map(|maybe_line| maybe_line.map(|(_, line)| line))
        .collect::<Result<_, _>>()?;

    Ok(Some(transaction))
}

/// Get every transaction with at least one line on `account_id`, including all of their lines.
///
/// The transactions are ordered by date and then ID, oldest first.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_transactions(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut transactions: Vec<Transaction> = connection
        .prepare(&format!(
            "{SELECT_TRANSACTION}
            WHERE \"transaction\".id IN
                (SELECT transaction_id FROM transaction_line WHERE account_id = :account_id)
            ORDER BY \"transaction\".date, \"transaction\".id"
        ))?
        .query_map(&[(":account_id", &account_id)], map_transaction_row)?
        .collect::<Result<_, _>>()?;

    let mut lines_by_transaction: HashMap<TransactionId, Vec<TransactionLine>> = HashMap::new();
    let lines = connection
        .prepare(
            "SELECT transaction_id, id, account_id, debit, credit
             FROM transaction_line
             WHERE transaction_id IN
                (SELECT transaction_id FROM transaction_line WHERE account_id = :account_id)
             ORDER BY id",
        )?
        .query_map(&[(":account_id", &account_id)], map_line_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for (transaction_id, line) in lines {
        lines_by_transaction
            .entry(transaction_id)
            .or_default()
            .push(line);
    }

    for transaction in &mut transactions {
        transaction.lines = lines_by_transaction
            .remove(&transaction.id)
            .unwrap_or_default();
    }

    Ok(transactions)
}

/// Delete a transaction and its lines.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - [Error::InvalidInput] if removing the lines would make an account's
///   running balance too large to represent,
/// - or [Error::SqlError] there is some other SQL error.
pub fn remove_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let account_ids: Vec<AccountId> = sql_transaction
        .prepare("SELECT DISTINCT account_id FROM transaction_line WHERE transaction_id = ?1")?
        .query_map((id,), |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    sql_transaction.execute(
        "DELETE FROM transaction_line WHERE transaction_id = ?1",
        (id,),
    )?;
    let rows_affected =
        sql_transaction.execute("DELETE FROM \"transaction\" WHERE id = ?1", (id,))?;

    if rows_affected == 0 {
        // Dropping the SQL transaction rolls back the line deletion.
        return Err(Error::NotFound);
    }

    check_balances_in_range(&account_ids, &sql_transaction)?;

    sql_transaction.commit()?;

    tracing::debug!("Deleted transaction {id}");

    Ok(())
}
