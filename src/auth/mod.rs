//! User accounts, sessions and the routes for logging in, registering and logging out.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod redirect;
mod register;
pub mod service;
pub mod session;
pub mod user;

pub use log_in::{get_log_in_page, post_log_in};
pub use log_out::get_log_out;
pub use middleware::{AuthState, auth_guard};
pub use password::PasswordHash;
pub use register::{get_register_page, register_user};
pub use service::LoggedInUser;
pub use session::{SESSION_DURATION, SessionToken};
pub use user::{User, UserID, create_user_table, get_user_by_id};
