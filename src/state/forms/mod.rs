//! Form domain layer
//!
//! Type-safe field handling shared by the auth wizard screens.

mod field;
mod form_state;

pub use field::FormField;
pub use form_state::{AuthFieldId, AuthFields, Form, OTP_LENGTH};
