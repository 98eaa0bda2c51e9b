//! Signals API module for HTTP communication

mod client;
mod traits;

pub use client::{ApiClient, DEFAULT_ADDRESS};
pub use traits::{SignalsApi, SignupRequest};

#[cfg(test)]
pub use traits::MockSignalsApi;
