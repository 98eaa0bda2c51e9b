//! Events delivered to the UI loop by background tasks

use crate::state::{AuthTokens, Page, PageRequest, SignalPost};
use uuid::Uuid;

/// Outcome of an auth round-trip, keyed to the step that issued it
#[derive(Debug)]
pub enum AuthOutcome {
    /// The step's remote check passed or failed
    Confirmed(bool),
    /// Login or registration finished and returned tokens
    SignedIn(AuthTokens),
    /// Password was reset; the user signs in again
    PasswordReset,
}

#[derive(Debug)]
pub enum AppEvent {
    /// A signal feed fetch settled
    FeedPage {
        request: PageRequest,
        result: Result<Page<SignalPost>, String>,
    },
    /// An auth call issued by the wizard `flow_id` settled
    Auth {
        flow_id: Uuid,
        step: u32,
        result: Result<AuthOutcome, String>,
    },
    /// The access token of the given session reached its expiry
    SessionExpired(Uuid),
    /// A token refresh for the given session settled
    TokensRefreshed {
        session_id: Uuid,
        result: Result<AuthTokens, String>,
    },
}
