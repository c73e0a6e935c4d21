//! Builds the per-account transaction listing with a running balance.

use std::collections::HashMap;

use rust_decimal::Decimal;
use time::Date;

use crate::{
    Error,
    account::{Account, AccountId},
    transaction::{Transaction, TransactionId},
};

/// One line of an account's transaction listing.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountTransactionRow {
    pub transaction_id: TransactionId,
    pub date: Date,
    pub transaction_type: String,
    pub description: String,
    /// The names of the other accounts on the transaction.
    pub other_accounts: Vec<String>,
    /// The change to the account's balance, positive when the balance grows.
    pub amount: Decimal,
    /// The account's balance after this line.
    pub balance: Decimal,
}

/// Build the listing rows for `account`, most recent first.
///
/// Every line of `transactions` that is on `account` gives one row, so a transaction
/// with two lines on the account gives two rows. Balances accumulate from the oldest
/// transaction, with ties on date broken by transaction ID.
///
/// `account_names` is used to name the other accounts on each transaction. Accounts
/// missing from the map are shown by their ID.
///
/// # Errors
///
/// Returns an [Error::BalanceOverflow] if a running balance does not fit in a [Decimal].
pub fn account_transaction_rows(
    account: &Account,
    transactions: &[Transaction],
    account_names: &HashMap<AccountId, String>,
) -> Result<Vec<AccountTransactionRow>, Error> {
    let direction = account.direction();

    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by_key(|transaction| (transaction.date, transaction.id));

    let mut balance = Decimal::ZERO;
    let mut rows = Vec::new();

    for transaction in ordered {
        let other_accounts: Vec<String> = transaction
            .lines
            .iter()
            .filter(|line| line.account_id != account.id)
            .map(|line| {
                account_names
                    .get(&line.account_id)
                    .cloned()
                    .unwrap_or_else(|| format!("Account #{}", line.account_id))
            })
            .collect();

        for line in transaction
            .lines
            .iter()
            .filter(|line| line.account_id == account.id)
        {
            let amount = direction
                .signed_amount(line.debit, line.credit)
                .ok_or(Error::BalanceOverflow(account.id))?;
            balance = balance
                .checked_add(amount)
                .ok_or(Error::BalanceOverflow(account.id))?;

            rows.push(AccountTransactionRow {
                transaction_id: transaction.id,
                date: transaction.date,
                transaction_type: transaction.transaction_type.name.clone(),
                description: transaction.description.clone(),
                other_accounts: other_accounts.clone(),
                amount,
                balance,
            });
        }
    }

    rows.reverse();
    Ok(rows)
}
