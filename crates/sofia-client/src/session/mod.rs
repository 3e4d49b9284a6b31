//! Sessions: login, request/response commands and keepalive

mod handle;
mod keepalive;
pub(crate) mod state;

pub use handle::Session;
pub use state::SessionState;
