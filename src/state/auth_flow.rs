//! Auth wizard state: signup, login and password reset flows
//!
//! Every flow type has an explicit table of named steps. Steps still carry
//! their historical screen numbers (password reset jumps from 2 to 4) so
//! numeric routes and copy lookups keep working, but progression only ever
//! follows the table.

use super::email::validate_email_format;
use super::forms::{AuthFieldId, AuthFields, Form, FormField, OTP_LENGTH};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Which wizard is running
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlowType {
    Signup,
    Login,
    ForgotPassword,
    /// Any route name we don't know; treated like password reset
    Other(String),
}

impl FlowType {
    /// Parse a route name such as `"forgotpassword"`
    pub fn from_route(route: &str) -> Self {
        match route.trim().to_ascii_lowercase().as_str() {
            "signup" => Self::Signup,
            "login" => Self::Login,
            "forgotpassword" => Self::ForgotPassword,
            _ => Self::Other(route.to_string()),
        }
    }

    pub fn route(&self) -> &str {
        match self {
            Self::Signup => "signup",
            Self::Login => "login",
            Self::ForgotPassword => "forgotpassword",
            Self::Other(route) => route,
        }
    }

    /// Ordered steps of this flow
    pub fn steps(&self) -> &'static [AuthStep] {
        const SIGNUP: &[AuthStep] = &[
            AuthStep::EmailEntry,
            AuthStep::OtpVerify,
            AuthStep::ProfileDetails,
            AuthStep::SetPassword,
            AuthStep::ConfirmPassword,
        ];
        const LOGIN: &[AuthStep] = &[AuthStep::Credentials];
        const RESET: &[AuthStep] = &[
            AuthStep::EmailEntry,
            AuthStep::OtpVerify,
            AuthStep::SetPassword,
            AuthStep::ConfirmPassword,
        ];

        match self {
            Self::Signup => SIGNUP,
            Self::Login => LOGIN,
            Self::ForgotPassword | Self::Other(_) => RESET,
        }
    }

    /// Step that follows `step`, or `None` when `step` is terminal
    pub fn next_step(&self, step: AuthStep) -> Option<AuthStep> {
        let steps = self.steps();
        let position = steps.iter().position(|s| *s == step)?;
        steps.get(position + 1).copied()
    }

    /// Named step for a screen number within this flow
    pub fn step_for_number(&self, number: u32) -> Option<AuthStep> {
        self.steps().iter().copied().find(|s| s.number() == number)
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route())
    }
}

/// Kind of account being created or used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    #[default]
    User,
    SignalProvider,
}

impl UserType {
    pub fn toggle(&self) -> Self {
        match self {
            Self::User => Self::SignalProvider,
            Self::SignalProvider => Self::User,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "Trader",
            Self::SignalProvider => "Signal provider",
        }
    }
}

/// Named wizard steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthStep {
    /// Login: username or email plus password
    Credentials,
    EmailEntry,
    OtpVerify,
    /// Signup only: public username
    ProfileDetails,
    SetPassword,
    ConfirmPassword,
}

impl AuthStep {
    /// Screen number this step has always been shown as
    pub fn number(&self) -> u32 {
        match self {
            Self::Credentials | Self::EmailEntry => 1,
            Self::OtpVerify => 2,
            Self::ProfileDetails => 3,
            Self::SetPassword => 4,
            Self::ConfirmPassword => 5,
        }
    }

    /// Fields the user fills in on this step
    pub fn fields(&self) -> &'static [AuthFieldId] {
        match self {
            Self::Credentials => &[AuthFieldId::Username, AuthFieldId::Password],
            Self::EmailEntry => &[AuthFieldId::Email],
            Self::OtpVerify => &[AuthFieldId::Otp],
            Self::ProfileDetails => &[AuthFieldId::Username],
            Self::SetPassword => &[AuthFieldId::Password],
            Self::ConfirmPassword => &[AuthFieldId::ConfirmPassword],
        }
    }
}

/// Local input problems; the step stays put and the user is re-prompted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Enter the {}-digit code", OTP_LENGTH)]
    OtpFormat,
    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("The {flow} flow has no step {step}")]
    UnknownStep { flow: String, step: u32 },
}

/// Result of asking the flow to move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTransition {
    /// Confirmation was missing; nothing changed
    Stayed(AuthStep),
    Moved(AuthStep),
    /// The terminal step was confirmed; the flow should exit
    Completed,
}

/// Title for a screen number of a flow.
///
/// Unknown step numbers resolve to an empty string.
pub fn resolve_title(step: u32, flow_type: &FlowType, user_type: UserType) -> String {
    let title = match flow_type {
        FlowType::Signup => match (step, user_type) {
            (1, UserType::SignalProvider) => "Enter your business email",
            (1, UserType::User) => "Enter your email",
            (2, _) => "Verify your email",
            (3, _) => "Choose a username",
            (4, _) => "Create a password",
            (5, _) => "Confirm your password",
            _ => "",
        },
        // Login renders a single credentials screen whatever the step.
        FlowType::Login => match step {
            1..=5 => "Enter your username or email",
            _ => "",
        },
        FlowType::ForgotPassword | FlowType::Other(_) => match step {
            1 => "Forgot your password?",
            2 => "Enter verification code",
            3 => "Log in to your account",
            4 => "Set a new password",
            5 => "Confirm your new password",
            _ => "",
        },
    };
    title.to_string()
}

/// Subtitle for a screen number of a flow.
///
/// Only steps 1 through 4 of the known flows carry a subtitle.
pub fn resolve_subtitle(step: u32, flow_type: &FlowType) -> String {
    let subtitle = match flow_type {
        FlowType::Signup => match step {
            1 => "We'll send a verification code to this address.",
            2 => "Enter the code we sent to your email.",
            3 => "This is how other traders will find you.",
            4 => "Use at least 8 characters.",
            _ => "",
        },
        FlowType::Login => match step {
            1..=4 => "Welcome back. Sign in to follow the latest signals.",
            _ => "",
        },
        FlowType::ForgotPassword => match step {
            1 => "Enter the email linked to your account and we'll send you a code.",
            2 => "Enter the code we sent to your email.",
            3 => "Sign in with your new password.",
            4 => "Choose a password you haven't used before.",
            _ => "",
        },
        FlowType::Other(_) => "",
    };
    subtitle.to_string()
}

/// One running instance of the auth wizard
#[derive(Debug, Clone)]
pub struct AuthFlow {
    /// Distinguishes this wizard from any flow it replaced
    id: Uuid,
    flow_type: FlowType,
    pub user_type: UserType,
    step: AuthStep,
    completed: bool,
    pub fields: AuthFields,
    active_field_index: usize,
    /// Last validation or API error shown under the form
    pub error: Option<String>,
    /// A confirmation round-trip is in flight; input is ignored meanwhile
    pub busy: bool,
}

impl AuthFlow {
    pub fn new(flow_type: FlowType, user_type: UserType) -> Self {
        let step = flow_type.steps()[0];
        Self {
            id: Uuid::new_v4(),
            flow_type,
            user_type,
            step,
            completed: false,
            fields: AuthFields::new(),
            active_field_index: 0,
            error: None,
            busy: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn flow_type(&self) -> &FlowType {
        &self.flow_type
    }

    pub fn step(&self) -> AuthStep {
        self.step
    }

    pub fn step_number(&self) -> u32 {
        self.step.number()
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Position in the flow as (current, total), both 1-based
    pub fn progress(&self) -> (usize, usize) {
        let steps = self.flow_type.steps();
        let index = steps.iter().position(|s| *s == self.step).unwrap_or(0);
        (index + 1, steps.len())
    }

    pub fn title(&self) -> String {
        resolve_title(self.step_number(), &self.flow_type, self.user_type)
    }

    /// Subtitle with the address from the first step filled in
    pub fn subtitle(&self) -> String {
        let subtitle = resolve_subtitle(self.step_number(), &self.flow_type);
        let email = self.fields.normalized_email();
        if self.step == AuthStep::OtpVerify && !email.is_empty() {
            subtitle.replace("your email", &email)
        } else {
            subtitle
        }
    }

    pub fn visible_fields(&self) -> &'static [AuthFieldId] {
        self.step.fields()
    }

    /// Check what can be checked locally before asking the API
    pub fn check_step(&self) -> Result<(), ValidationError> {
        let fields = &self.fields;
        match self.step {
            AuthStep::Credentials => {
                if fields.username.is_empty() {
                    return Err(ValidationError::MissingField("Username or email"));
                }
                if fields.password.as_text().is_empty() {
                    return Err(ValidationError::MissingField("Password"));
                }
                Ok(())
            }
            AuthStep::EmailEntry => {
                if validate_email_format(Some(fields.email.as_text().trim())) {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidEmail)
                }
            }
            AuthStep::OtpVerify => {
                if fields.otp.as_text().len() == OTP_LENGTH {
                    Ok(())
                } else {
                    Err(ValidationError::OtpFormat)
                }
            }
            AuthStep::ProfileDetails => {
                if fields.username.is_empty() {
                    Err(ValidationError::MissingField("Username"))
                } else {
                    Ok(())
                }
            }
            AuthStep::SetPassword => {
                if fields.password.as_text().chars().count() < MIN_PASSWORD_LEN {
                    Err(ValidationError::PasswordTooShort {
                        min: MIN_PASSWORD_LEN,
                    })
                } else {
                    Ok(())
                }
            }
            AuthStep::ConfirmPassword => {
                if fields.password.as_text() == fields.confirm_password.as_text() {
                    Ok(())
                } else {
                    Err(ValidationError::PasswordMismatch)
                }
            }
        }
    }

    /// Move to the next step of the table once the current one is confirmed.
    ///
    /// `confirmed` comes from whoever validated the step (the local check,
    /// an OTP round-trip, the reset call). Without it nothing changes.
    pub fn advance(&mut self, confirmed: bool) -> StepTransition {
        if self.completed {
            return StepTransition::Completed;
        }
        if !confirmed {
            return StepTransition::Stayed(self.step);
        }

        self.error = None;
        match self.flow_type.next_step(self.step) {
            Some(next) => {
                tracing::debug!(flow = %self.flow_type, from = ?self.step, to = ?next, "auth step advanced");
                self.step = next;
                self.active_field_index = 0;
                StepTransition::Moved(next)
            }
            None => {
                tracing::debug!(flow = %self.flow_type, "auth flow completed");
                self.completed = true;
                StepTransition::Completed
            }
        }
    }

    /// Jump to a screen number, e.g. when the user goes back
    pub fn set_step(&mut self, number: u32) -> Result<AuthStep, ValidationError> {
        let step = self
            .flow_type
            .step_for_number(number)
            .ok_or_else(|| ValidationError::UnknownStep {
                flow: self.flow_type.route().to_string(),
                step: number,
            })?;
        self.step = step;
        self.completed = false;
        self.active_field_index = 0;
        self.error = None;
        Ok(step)
    }

    /// Step back one entry of the table, if there is one
    pub fn go_back(&mut self) -> bool {
        let steps = self.flow_type.steps();
        match steps.iter().position(|s| *s == self.step) {
            Some(index) if index > 0 => self.set_step(steps[index - 1].number()).is_ok(),
            _ => false,
        }
    }

    pub fn active_field_id(&self) -> Option<AuthFieldId> {
        self.visible_fields().get(self.active_field_index).copied()
    }
}

impl Form for AuthFlow {
    fn field_count(&self) -> usize {
        self.visible_fields().len()
    }
    fn active_field(&self) -> usize {
        self.active_field_index
    }
    fn set_active_field(&mut self, index: usize) {
        self.active_field_index = index.min(self.field_count().saturating_sub(1));
    }
    fn get_active_field_mut(&mut self) -> Option<&mut FormField> {
        let id = self.active_field_id()?;
        Some(self.fields.get_mut(id))
    }
    fn get_field(&self, index: usize) -> Option<&FormField> {
        let id = self.visible_fields().get(index)?;
        Some(self.fields.get(*id))
    }
}
