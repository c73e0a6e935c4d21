//! Defines the route handler for the page that lists an account's transactions with running balances.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error,
    account::{Account, AccountId, AccountType, get_account_types, get_accounts, get_balance_for_account},
    auth::UserID,
    endpoints,
    html::{
        BUTTON_DELETE_STYLE, BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        base, format_currency, loading_spinner,
    },
    navigation::NavBar,
    timezone::local_today,
    transaction::{
        AccountTransactionRow, TransactionType, account_transaction_rows, get_transaction_types,
        get_transactions,
    },
};

/// The state needed for the transactions page.
#[derive(Debug, Clone)]
pub struct TransactionsPageState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters for the transactions page.
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(rename = "accountId")]
    pub account_id: Option<AccountId>,
}

/// An account in the side list together with its balance.
struct AccountSummary<'a> {
    account: &'a Account,
    balance: Decimal,
}

/// Everything needed to render the page.
struct TransactionsViewModel<'a> {
    accounts: Vec<AccountSummary<'a>>,
    selected: Option<&'a Account>,
    selected_balance: Decimal,
    rows: Vec<AccountTransactionRow>,
    account_types: Vec<AccountType>,
    transaction_types: Vec<TransactionType>,
    today: Date,
}

/// Display the transactions for the account given by `accountId`.
///
/// Without an `accountId` the client is redirected to the user's first account, if they have one.
pub async fn get_transactions_page(
    State(state): State<TransactionsPageState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("Could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let accounts = get_accounts(user_id, &connection)?;

    let selected = match query.account_id {
        Some(account_id) => Some(
            accounts
                .iter()
                .find(|account| account.id == account_id)
                .ok_or(Error::NotFound)?,
        ),
        None => match accounts.first() {
            Some(first) => {
                return Ok(Redirect::to(&endpoints::with_query(
                    endpoints::TRANSACTIONS_VIEW,
                    "accountId",
                    first.id,
                ))
                .into_response());
            }
            None => None,
        },
    };

    let summaries = accounts
        .iter()
        .map(|account| {
            get_balance_for_account(account.id, &connection)
                .map(|balance| AccountSummary { account, balance })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let (rows, selected_balance) = match selected {
        Some(account) => {
            let account_names: HashMap<AccountId, String> = accounts
                .iter()
                .map(|account| (account.id, account.name.clone()))
                .collect();
            let transactions = get_transactions(account.id, &connection)?;
            let rows = account_transaction_rows(account, &transactions, &account_names)?;
            let balance = summaries
                .iter()
                .find(|summary| summary.account.id == account.id)
                .map(|summary| summary.balance)
                .unwrap_or_default();

            (rows, balance)
        }
        None => (Vec::new(), Decimal::ZERO),
    };

    let view_model = TransactionsViewModel {
        accounts: summaries,
        selected,
        selected_balance,
        rows,
        account_types: get_account_types(&connection)?,
        transaction_types: get_transaction_types(&connection)?,
        today,
    };

    Ok(transactions_view(&view_model).into_response())
}

fn transactions_view(view_model: &TransactionsViewModel) -> Markup {
    let nav_bar = NavBar::new(endpoints::TRANSACTIONS_VIEW).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-screen-xl grid gap-8 lg:grid-cols-4"
            {
                aside class="lg:col-span-1 space-y-8"
                {
                    (accounts_list_view(&view_model.accounts, view_model.selected))
                    (create_account_form_view(&view_model.account_types))
                }

                section class="lg:col-span-3 space-y-8"
                {
                    @match view_model.selected {
                        Some(account) => {
                            header
                            {
                                h1 class="text-2xl font-bold" { (account.name) }
                                p class="text-gray-500 dark:text-gray-400" { (account.account_type.name) }
                                p id="account-balance" class="text-xl font-semibold"
                                {
                                    "Balance: " (format_currency(view_model.selected_balance))
                                }
                            }

                            (transactions_table_view(&view_model.rows))
                            (transfer_form_view(view_model))
                        }
                        None => {
                            p
                            {
                                "You have no accounts yet. Create one to start recording transactions."
                            }
                        }
                    }
                }
            }
        }
    };

    base("Transactions", &content)
}

fn accounts_list_view(accounts: &[AccountSummary], selected: Option<&Account>) -> Markup {
    html! {
        nav aria-label="Accounts"
        {
            h2 class="text-xl font-bold mb-4" { "Accounts" }

            ul id="accounts" class="space-y-2"
            {
                @for summary in accounts {
                    @let is_selected = selected.is_some_and(|account| account.id == summary.account.id);
                    li class="flex justify-between gap-4"
                    {
                        a
                            href=(endpoints::with_query(endpoints::TRANSACTIONS_VIEW, "accountId", summary.account.id))
                            class=(LINK_STYLE)
                            aria-current=[is_selected.then_some("page")]
                        {
                            (summary.account.name)
                        }

                        span class="tabular-nums" { (format_currency(summary.balance)) }
                    }
                }
            }
        }
    }
}

fn transactions_table_view(rows: &[AccountTransactionRow]) -> Markup {
    html! {
        p id="delete-error" class="text-red-500 text-base" {}

        @if rows.is_empty() {
            p id="no-transactions" { "No transactions yet." }
        } @else {
            div class="relative overflow-x-auto shadow-md sm:rounded-lg"
            {
                table id="transactions" class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Type" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Description" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Accounts" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Amount" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Balance" }
                            th scope="col" class=(TABLE_CELL_STYLE) { span class="sr-only" { "Actions" } }
                        }
                    }

                    tbody
                    {
                        @for row in rows {
                            tr class=(TABLE_ROW_STYLE) data-transaction-id=(row.transaction_id)
                            {
                                td class=(TABLE_CELL_STYLE) { time datetime=(row.date) { (row.date) } }
                                td class=(TABLE_CELL_STYLE) { (row.transaction_type) }
                                td class=(TABLE_CELL_STYLE) { (row.description) }
                                td class=(TABLE_CELL_STYLE) { (row.other_accounts.join(", ")) }
                                td class={ (TABLE_CELL_STYLE) " text-right tabular-nums" } { (format_currency(row.amount)) }
                                td class={ (TABLE_CELL_STYLE) " text-right tabular-nums" } { (format_currency(row.balance)) }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    button
                                        type="button"
                                        class=(BUTTON_DELETE_STYLE)
                                        hx-get=(endpoints::with_query(endpoints::DELETE_TRANSACTION, "transactionId", row.transaction_id))
                                        hx-confirm="Delete this transaction? This removes it from every account it touches."
                                        hx-target="#delete-error"
                                        hx-swap="innerHTML"
                                    {
                                        "Delete"
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn account_select(label: &str, name: &str, accounts: &[AccountSummary], selected: Option<AccountId>) -> Markup {
    html! {
        div
        {
            label for=(name) class=(FORM_LABEL_STYLE) { (label) }

            select name=(name) id=(name) class=(FORM_TEXT_INPUT_STYLE) required
            {
                @for summary in accounts {
                    option
                        value=(summary.account.id)
                        selected[selected == Some(summary.account.id)]
                    {
                        (summary.account.name)
                    }
                }
            }
        }
    }
}

fn transfer_form_view(view_model: &TransactionsViewModel) -> Markup {
    let selected_id = view_model.selected.map(|account| account.id);

    html! {
        form
            id="transfer-form"
            hx-post=(endpoints::TRANSFER)
            hx-target="#transfer-error"
            hx-swap="innerHTML"
            hx-indicator="#indicator"
            hx-disabled-elt="#transfer-submit"
            class="space-y-4 max-w-md"
        {
            h2 class="text-xl font-bold" { "New Transaction" }

            p id="transfer-error" class="text-red-500 text-base" {}

            (account_select("Debit Account", "debitAccountId", &view_model.accounts, selected_id))
            (account_select("Credit Account", "creditAccountId", &view_model.accounts, None))

            div
            {
                label for="transactionTypeId" class=(FORM_LABEL_STYLE) { "Type" }

                select name="transactionTypeId" id="transactionTypeId" class=(FORM_TEXT_INPUT_STYLE) required
                {
                    @for transaction_type in &view_model.transaction_types {
                        option value=(transaction_type.id) { (transaction_type.name) }
                    }
                }
            }

            div
            {
                label for="transactionDate" class=(FORM_LABEL_STYLE) { "Date" }

                input
                    type="date"
                    name="transactionDate"
                    id="transactionDate"
                    value=(view_model.today)
                    class=(FORM_TEXT_INPUT_STYLE)
                    required;
            }

            div
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }

                input
                    type="text"
                    name="amount"
                    id="amount"
                    placeholder="0.00"
                    inputmode="decimal"
                    class=(FORM_TEXT_INPUT_STYLE)
                    required;
            }

            div
            {
                label for="description" class=(FORM_LABEL_STYLE) { "Description" }

                input
                    type="text"
                    name="description"
                    id="description"
                    class=(FORM_TEXT_INPUT_STYLE)
                    required;
            }

            button type="submit" id="transfer-submit" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Record Transaction"
            }
        }
    }
}

fn create_account_form_view(account_types: &[AccountType]) -> Markup {
    html! {
        form id="create-account-form" method="post" action=(endpoints::ACCOUNTS) class="space-y-4"
        {
            h2 class="text-xl font-bold" { "New Account" }

            div
            {
                label for="name" class=(FORM_LABEL_STYLE) { "Name" }

                input
                    type="text"
                    name="name"
                    id="name"
                    class=(FORM_TEXT_INPUT_STYLE)
                    required;
            }

            div
            {
                label for="accountTypeId" class=(FORM_LABEL_STYLE) { "Type" }

                select name="accountTypeId" id="accountTypeId" class=(FORM_TEXT_INPUT_STYLE) required
                {
                    @for account_type in account_types {
                        option value=(account_type.id)
                        {
                            (account_type.category.name) ": " (account_type.name)
                        }
                    }
                }
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Create Account" }
        }
    }
}

#[cfg(test)]
mod transactions_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Query, State},
        http::StatusCode,
    };
    use rust_decimal::Decimal;
    use scraper::{ElementRef, Html, Selector};
    use time::macros::date;

    use crate::{
        Error,
        auth::UserID,
        endpoints,
        test_utils::{
            assert_valid_html, create_test_account, create_test_user, create_test_user_named,
            insert_test_line, parse_html_document, transaction_type_id,
        },
        transaction::{Transfer, create_transfer},
    };

    use super::{TransactionsPageState, TransactionsQuery, get_transactions_page};

    fn get_state(connection: rusqlite::Connection) -> TransactionsPageState {
        TransactionsPageState {
            local_timezone: "Etc/UTC".to_owned(),
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }

    async fn get_page(
        state: &TransactionsPageState,
        user_id: UserID,
        account_id: Option<i64>,
    ) -> Result<axum::response::Response, Error> {
        get_transactions_page(
            State(state.clone()),
            Extension(user_id),
            Query(TransactionsQuery { account_id }),
        )
        .await
    }

    fn must_get_rows(document: &Html) -> Vec<ElementRef<'_>> {
        let selector = Selector::parse("#transactions tbody tr").unwrap();
        document.select(&selector).collect()
    }

    fn cell_texts(row: ElementRef<'_>) -> Vec<String> {
        let selector = Selector::parse("td").unwrap();
        row.select(&selector)
            .map(|cell| cell.text().collect::<String>().trim().to_owned())
            .collect()
    }

    #[tokio::test]
    async fn redirects_to_first_account() {
        let (conn, user_id) = create_test_user();
        create_test_account(user_id, "Savings", "Savings", &conn);
        let first = create_test_account(user_id, "Everyday", "Checking", &conn);
        let state = get_state(conn);

        let response = get_page(&state, user_id, None).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            &endpoints::with_query(endpoints::TRANSACTIONS_VIEW, "accountId", first.id)
        );
    }

    #[tokio::test]
    async fn renders_empty_state_without_accounts() {
        let (conn, user_id) = create_test_user();
        let state = get_state(conn);

        let response = get_page(&state, user_id, None).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);
        let selector = Selector::parse("#create-account-form").unwrap();
        assert!(document.select(&selector).next().is_some());
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let (conn, user_id) = create_test_user();
        let state = get_state(conn);

        let result = get_page(&state, user_id, Some(42)).await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }

    #[tokio::test]
    async fn other_users_account_is_not_found() {
        let (conn, user_id) = create_test_user();
        let other_user = create_test_user_named("grace", &conn);
        let theirs = create_test_account(other_user, "Theirs", "Checking", &conn);
        let state = get_state(conn);

        let result = get_page(&state, user_id, Some(theirs.id)).await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }

    #[tokio::test]
    async fn renders_transactions_with_running_balance() {
        let (conn, user_id) = create_test_user();
        let checking = create_test_account(user_id, "Everyday", "Checking", &conn);
        let salary = create_test_account(user_id, "Employer", "Salary", &conn);
        let groceries = create_test_account(user_id, "Food", "Groceries", &conn);
        let deposit = transaction_type_id("Deposit", &conn);
        let purchase = transaction_type_id("Purchase", &conn);
        create_transfer(
            Transfer {
                debit_account_id: checking.id,
                credit_account_id: salary.id,
                transaction_type_id: deposit,
                date: date!(2025 - 06 - 01),
                amount: Decimal::new(100000, 2),
                description: "Pay day".to_owned(),
            },
            &conn,
        )
        .unwrap();
        create_transfer(
            Transfer {
                debit_account_id: groceries.id,
                credit_account_id: checking.id,
                transaction_type_id: purchase,
                date: date!(2025 - 06 - 02),
                amount: Decimal::new(2550, 2),
                description: "Supermarket".to_owned(),
            },
            &conn,
        )
        .unwrap();
        let state = get_state(conn);

        let response = get_page(&state, user_id, Some(checking.id)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);

        let rows = must_get_rows(&document);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            cell_texts(rows[0])[..6],
            ["2025-06-02", "Purchase", "Supermarket", "Food", "-$25.50", "$974.50"]
        );
        assert_eq!(
            cell_texts(rows[1])[..6],
            ["2025-06-01", "Deposit", "Pay day", "Employer", "$1,000.00", "$1,000.00"]
        );

        let balance = document
            .select(&Selector::parse("#account-balance").unwrap())
            .next()
            .unwrap()
            .text()
            .collect::<String>();
        assert!(balance.contains("$974.50"), "got balance text {balance:?}");
    }

    #[tokio::test]
    async fn renders_transfer_form() {
        let (conn, user_id) = create_test_user();
        let checking = create_test_account(user_id, "Everyday", "Checking", &conn);
        let state = get_state(conn);

        let response = get_page(&state, user_id, Some(checking.id)).await.unwrap();
        let document = parse_html_document(response).await;

        let form = document
            .select(&Selector::parse("#transfer-form").unwrap())
            .next()
            .expect("transfer form missing");
        assert_eq!(form.value().attr("hx-post"), Some(endpoints::TRANSFER));
        for name in [
            "debitAccountId",
            "creditAccountId",
            "transactionTypeId",
            "transactionDate",
            "amount",
            "description",
        ] {
            let selector = Selector::parse(&format!("[name={name}]")).unwrap();
            assert!(form.select(&selector).next().is_some(), "missing field {name}");
        }
    }

    #[tokio::test]
    async fn renders_largest_representable_balance() {
        let (conn, user_id) = create_test_user();
        let checking = create_test_account(user_id, "Everyday", "Checking", &conn);
        let salary = create_test_account(user_id, "Employer", "Salary", &conn);
        create_transfer(
            Transfer {
                debit_account_id: checking.id,
                credit_account_id: salary.id,
                transaction_type_id: transaction_type_id("Deposit", &conn),
                date: date!(2025 - 01 - 01),
                amount: Decimal::MAX,
                description: "Windfall".to_owned(),
            },
            &conn,
        )
        .unwrap();
        let state = get_state(conn);

        let response = get_page(&state, user_id, Some(checking.id)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_eq!(must_get_rows(&document).len(), 1);
    }

    #[tokio::test]
    async fn balance_too_large_to_represent_is_an_error() {
        let (conn, user_id) = create_test_user();
        let checking = create_test_account(user_id, "Everyday", "Checking", &conn);
        insert_test_line(checking.id, Decimal::MAX, Decimal::ZERO, &conn);
        insert_test_line(checking.id, Decimal::MAX, Decimal::ZERO, &conn);
        let state = get_state(conn);

        let result = get_page(&state, user_id, Some(checking.id)).await;

        assert_eq!(result.err(), Some(Error::BalanceOverflow(checking.id)));
        assert!(!state.db_connection.is_poisoned());
    }
}
