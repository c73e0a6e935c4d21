//! The registration page for creating a new user account.
use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::{
        PasswordHash,
        cookie::set_session_cookie,
        log_in::client_hostname,
        service::{Registration, log_in, register},
    },
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, LINK_STYLE, base,
        loading_spinner, log_in_register, password_input, text_input,
    },
};

fn confirm_password_input(error_message: Option<&str>) -> Markup {
    html! {
        div
        {
            label
                for="confirm-password"
                class=(FORM_LABEL_STYLE)
            {
                "Confirm Password"
            }

            input
                type="password"
                name="confirm_password"
                id="confirm-password"
                placeholder="••••••••"
                class=(FORM_TEXT_INPUT_STYLE)
                required
                autofocus[error_message.is_some()]
            ;

            @if let Some(error_message) = error_message
            {
                p class="text-red-500 text-base" { (error_message) }
            }
        }
    }
}

/// Which field an error message should be shown under.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FormError<'a> {
    None,
    Details(&'a str),
    Password(&'a str),
    ConfirmPassword(&'a str),
}

fn registration_form(user_data: &RegisterForm, error: FormError) -> Markup {
    let details_error = match error {
        FormError::Details(message) => Some(message),
        _ => None,
    };
    let password_error = match error {
        FormError::Password(message) => Some(message),
        _ => None,
    };
    let confirm_error = match error {
        FormError::ConfirmPassword(message) => Some(message),
        _ => None,
    };

    html! {
        form
            hx-post=(endpoints::REGISTER_VIEW)
            hx-swap="outerHTML"
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            @if let Some(message) = details_error
            {
                p class="text-red-500 text-base" { (message) }
            }

            (text_input("First Name", "first_name", &user_data.first_name, error == FormError::None))
            (text_input("Last Name", "last_name", &user_data.last_name, false))
            (text_input("Username", "username", &user_data.username, details_error.is_some()))
            (password_input("", password_error))
            (confirm_password_input(confirm_error))

            button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Create Account"
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Already have an account? "

                a href=(endpoints::LOG_IN_VIEW) tabindex="0" class=(LINK_STYLE)
                {
                  "Log in here"
                }
            }
        }
    }
}

/// Display the registration page.
pub async fn get_register_page() -> Response {
    let registration_form = registration_form(&RegisterForm::default(), FormError::None);
    let content = log_in_register("Create an account", &registration_form);
    base("Register", &content).into_response()
}

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The bcrypt cost used to hash new passwords.
    pub password_cost: u32,
    /// The database connection holding the user and session tables.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            password_cost: PasswordHash::DEFAULT_COST,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegistrationState> for Key {
    fn from_ref(state: &RegistrationState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered by the user in the registration form.
#[derive(Default, Serialize, Deserialize)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

/// Handler for registration requests via the POST method.
///
/// On success the new user is logged in and redirected to the transactions page.
/// Otherwise, the form is returned with an error message explaining the problem.
pub async fn register_user(
    State(state): State<RegistrationState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
    Form(user_data): Form<RegisterForm>,
) -> Response {
    let hostname = client_hostname(&headers);

    let result = match state.db_connection.lock() {
        Ok(connection) => register(
            Registration {
                first_name: &user_data.first_name,
                last_name: &user_data.last_name,
                username: &user_data.username,
                password: &user_data.password,
                password_confirm: &user_data.confirm_password,
            },
            state.password_cost,
            &connection,
        )
        .and_then(|user| {
            log_in(
                &user.username,
                &user_data.password,
                &hostname,
                OffsetDateTime::now_utc(),
                &connection,
            )
        }),
        Err(error) => {
            tracing::error!("Could not acquire database lock: {error}");
            Err(Error::DatabaseLockError)
        }
    };

    match result {
        Ok(logged_in) => (
            StatusCode::SEE_OTHER,
            HxRedirect(endpoints::TRANSACTIONS_VIEW.to_owned()),
            set_session_cookie(jar, &logged_in.token, logged_in.expires_at),
        )
            .into_response(),
        Err(Error::InvalidInput(message)) if user_data.password != user_data.confirm_password => {
            registration_form(&user_data, FormError::ConfirmPassword(&message)).into_response()
        }
        Err(Error::InvalidInput(message)) if user_data.password.is_empty() => {
            registration_form(&user_data, FormError::Password(&message)).into_response()
        }
        Err(error @ (Error::InvalidInput(_) | Error::DuplicateUser(_))) => {
            registration_form(&user_data, FormError::Details(&error.to_string())).into_response()
        }
        Err(error) => {
            tracing::error!("An unhandled error occurred while registering a new user: {error}");
            registration_form(
                &user_data,
                FormError::Details("An internal error occurred. Please try again later."),
            )
            .into_response()
        }
    }
}
