//! Email shape check used by the email-entry steps

use regex::Regex;
use std::sync::OnceLock;

const EMAIL_PATTERN: &str = concat!(
    r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))"#,
    r#"@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-z\-0-9]+\.)+[a-z]{2,}))$"#,
);

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

/// Returns true when `input` looks like an email address.
///
/// Input is lowercased before matching. Missing and malformed input are
/// both reported as `false`.
pub fn validate_email_format(input: Option<&str>) -> bool {
    match input {
        Some(value) => email_regex().is_match(&value.to_lowercase()),
        None => false,
    }
}
