//! Request construction, response capture, and assertion checks.
mod check;
mod client;
mod exchange;
mod request;


pub use check::{ResponseSnapshot, check_response};
pub use client::{ClientSettings, DEFAULT_REQUEST_TIMEOUT, build_client};
pub use exchange::Worker;
pub use request::{
    BuildContext, MultipartField, PreparedBody, PreparedRequest, build_transaction_request,
};
