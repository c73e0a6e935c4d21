use rusqlite::Connection;
use rust_decimal::Decimal;
use time::macros::date;

use crate::{
    account::{Account, AccountId, AccountTypeId, create_account, get_account_types},
    auth::{
        PasswordHash, UserID,
        user::{NewUser, create_user},
    },
    db::initialize,
    transaction::{TransactionId, TransactionTypeId, get_transaction_types},
};

/// Open an initialized in-memory database with the user "ada".
pub(crate) fn create_test_user() -> (Connection, UserID) {
    let conn = Connection::open_in_memory().expect("Could not open database in memory");
    initialize(&conn).expect("Could not initialize database");

    let user_id = create_test_user_named("ada", &conn);

    (conn, user_id)
}

#[track_caller]
pub(crate) fn create_test_user_named(username: &str, conn: &Connection) -> UserID {
    create_user(
        NewUser {
            first_name: "Test".to_owned(),
            last_name: "User".to_owned(),
            username: username.to_owned(),
            password_hash: PasswordHash::new_unchecked("hunter2"),
        },
        conn,
    )
    .expect("Could not create test user")
    .id
}

#[track_caller]
pub(crate) fn account_type_id(name: &str, conn: &Connection) -> AccountTypeId {
    get_account_types(conn)
        .expect("Could not get account types")
        .into_iter()
        .find(|account_type| account_type.name == name)
        .unwrap_or_else(|| panic!("No account type named {name:?}"))
        .id
}

#[track_caller]
pub(crate) fn transaction_type_id(name: &str, conn: &Connection) -> TransactionTypeId {
    get_transaction_types(conn)
        .expect("Could not get transaction types")
        .into_iter()
        .find(|transaction_type| transaction_type.name == name)
        .unwrap_or_else(|| panic!("No transaction type named {name:?}"))
        .id
}

#[track_caller]
pub(crate) fn create_test_account(
    user_id: UserID,
    name: &str,
    account_type: &str,
    conn: &Connection,
) -> Account {
    create_account(user_id, name, account_type_id(account_type, conn), conn)
        .expect("Could not create test account")
}

/// Write a single-line transaction straight to the database, skipping the
/// checks done when recording a transfer.
#[track_caller]
pub(crate) fn insert_test_line(
    account_id: AccountId,
    debit: Decimal,
    credit: Decimal,
    conn: &Connection,
) -> TransactionId {
    let transaction_id: TransactionId = conn
        .query_row(
            "INSERT INTO \"transaction\" (date, transaction_type_id, description)
             VALUES (?1, ?2, 'Imported') RETURNING id",
            (date!(2025 - 01 - 01), transaction_type_id("Transfer", conn)),
            |row| row.get(0),
        )
        .expect("Could not insert test transaction");

    conn.execute(
        "INSERT INTO transaction_line (transaction_id, account_id, debit, credit)
         VALUES (?1, ?2, ?3, ?4)",
        (transaction_id, account_id, debit.to_string(), credit.to_string()),
    )
    .expect("Could not insert test transaction line");

    transaction_id
}
