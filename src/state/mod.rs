//! Application state module

mod app_state;
mod auth_flow;
mod email;
mod forms;
mod pagination;
mod session;

pub use app_state::*;
pub use auth_flow::*;
pub use forms::*;
pub use pagination::*;
pub use session::*;

#[cfg(test)]
pub(crate) use app_state::fixtures;
