//! Parsing money amounts from user input and reading them from the database.

use std::str::FromStr;

use rusqlite::{Row, types::Type};
use rust_decimal::Decimal;

use crate::Error;

/// Parse a positive money amount entered by a user, e.g. "$1,234.50".
///
/// Dollar signs and thousands separators are ignored.
///
/// # Errors
///
/// Returns an [Error::InvalidInput] if the text is not a number or is not greater than zero.
pub fn parse_amount(raw_amount: &str) -> Result<Decimal, Error> {
    let cleaned: String = raw_amount
        .chars()
        .filter(|c| *c != ',' && *c != '$')
        .collect();
    let cleaned = cleaned.trim();

    let amount = Decimal::from_str(cleaned)
        .map_err(|_| Error::InvalidInput(format!("\"{raw_amount}\" is not a valid amount")))?;

    if amount <= Decimal::ZERO {
        return Err(Error::InvalidInput(
            "Amount must be greater than zero".to_owned(),
        ));
    }

    Ok(amount)
}

/// Read an amount stored as TEXT from column `index` of `row`.
pub(crate) fn read_amount(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let raw: String = row.get(index)?;

    Decimal::from_str(&raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, error.into()))
}
