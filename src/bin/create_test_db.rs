use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use rust_decimal::Decimal;
use time::{Duration, OffsetDateTime};

use stock_tracker::{
    PasswordHash, UserID, initialize_db,
    ledger::{Transfer, create_account, create_transfer, get_account_types, get_transaction_types},
};

/// A utility for creating a test database for the stock_tracker web server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
///
/// The database has a user "test" with the password "test", a handful of
/// accounts and a few months of transfers between them.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user...");
    let password_hash = PasswordHash::new("test", PasswordHash::DEFAULT_COST)?;
    let user_id: i64 = conn.query_row(
        "INSERT INTO user (first_name, last_name, username, password)
        VALUES ('Test', 'User', 'test', ?1) RETURNING id",
        (password_hash.as_ref(),),
        |row| row.get(0),
    )?;
    let user_id = UserID::new(user_id);

    println!("Creating accounts...");
    let account_type_id = |name: &str| -> Result<i64, Box<dyn Error>> {
        get_account_types(&conn)?
            .into_iter()
            .find(|account_type| account_type.name == name)
            .map(|account_type| account_type.id)
            .ok_or_else(|| format!("missing account type {name}").into())
    };
    let transaction_type_id = |name: &str| -> Result<i64, Box<dyn Error>> {
        get_transaction_types(&conn)?
            .into_iter()
            .find(|transaction_type| transaction_type.name == name)
            .map(|transaction_type| transaction_type.id)
            .ok_or_else(|| format!("missing transaction type {name}").into())
    };

    let checking = create_account(user_id, "Everyday", account_type_id("Checking")?, &conn)?;
    let savings = create_account(user_id, "Rainy Day", account_type_id("Savings")?, &conn)?;
    let credit_card = create_account(user_id, "Visa", account_type_id("Credit Card")?, &conn)?;
    let salary = create_account(user_id, "Salary", account_type_id("Salary")?, &conn)?;
    let groceries = create_account(user_id, "Groceries", account_type_id("Groceries")?, &conn)?;
    let rent = create_account(user_id, "Rent", account_type_id("Rent")?, &conn)?;

    println!("Creating transactions...");
    let deposit = transaction_type_id("Deposit")?;
    let purchase = transaction_type_id("Purchase")?;
    let transfer = transaction_type_id("Transfer")?;
    let today = OffsetDateTime::now_utc().date();

    for week in (0..12).rev() {
        let date = today - Duration::weeks(week);

        let transfers = [
            (checking.id, salary.id, deposit, Decimal::new(150000, 2), "Pay"),
            (rent.id, checking.id, transfer, Decimal::new(55000, 2), "Rent"),
            (groceries.id, credit_card.id, purchase, Decimal::new(18742, 2), "Supermarket"),
            (savings.id, checking.id, transfer, Decimal::new(20000, 2), "Savings"),
            (credit_card.id, checking.id, transfer, Decimal::new(18742, 2), "Pay off Visa"),
        ];

        for (debit_account_id, credit_account_id, transaction_type_id, amount, description) in
            transfers
        {
            create_transfer(
                Transfer {
                    debit_account_id,
                    credit_account_id,
                    transaction_type_id,
                    date,
                    amount,
                    description: description.to_owned(),
                },
                &conn,
            )?;
        }
    }

    println!("Success!");

    Ok(())
}
