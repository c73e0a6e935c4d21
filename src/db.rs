//! Creates the application's database schema and seeds its lookup tables.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    account::{create_account_tables, seed_account_types},
    auth::{create_user_table, session::create_session_table},
    transaction::{create_transaction_tables, seed_transaction_types},
};

/// Create the tables for the domain models and seed the account categories,
/// account types and transaction types.
///
/// Safe to call on a database that has already been initialized.
///
/// # Errors
///
/// Returns an [Error::SqlError] if any of the tables could not be created or seeded.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_session_table(&transaction)?;
    create_account_tables(&transaction)?;
    create_transaction_tables(&transaction)?;

    seed_account_types(&transaction)?;
    seed_transaction_types(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use crate::{account::get_account_types, transaction::get_transaction_types};

    use super::initialize;

    #[test]
    fn seeds_lookup_tables() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        assert_eq!(get_account_types(&conn).unwrap().len(), 14);
        assert_eq!(get_transaction_types(&conn).unwrap().len(), 7);
    }

    #[test]
    fn can_initialize_twice() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();
        initialize(&conn).unwrap();

        assert_eq!(get_account_types(&conn).unwrap().len(), 14);
        assert_eq!(get_transaction_types(&conn).unwrap().len(), 7);
    }

    #[test]
    fn enables_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        let enabled: bool = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }
}
