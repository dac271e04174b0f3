//! Stateless cookie sessions, log-in and log-out, and the ownership checks
//! every account route goes through.

mod cookie;
mod gate;
mod log_in;
mod log_out;
mod session;
mod token;

pub use gate::{require_authenticated, require_ownership};
pub use log_in::{AuthState, LogInData, post_log_in};
pub use log_out::post_log_out;
pub use session::{Principal, Session, SessionResponse, get_session};

pub(crate) use cookie::DEFAULT_COOKIE_DURATION;

#[cfg(test)]
pub(crate) use cookie::{COOKIE_TOKEN, set_auth_cookie};
