//! Form focus handling and the auth field buffer

use super::field::FormField;

/// Trait for common form operations
pub trait Form {
    fn field_count(&self) -> usize;
    fn active_field(&self) -> usize;
    fn set_active_field(&mut self, index: usize);
    fn next_field(&mut self) {
        let count = self.field_count();
        if count == 0 {
            return;
        }
        let current = self.active_field();
        self.set_active_field((current + 1) % count);
    }
    fn prev_field(&mut self) {
        let count = self.field_count();
        if count == 0 {
            return;
        }
        let current = self.active_field();
        if current == 0 {
            self.set_active_field(count - 1);
        } else {
            self.set_active_field(current - 1);
        }
    }
    fn get_active_field_mut(&mut self) -> Option<&mut FormField>;
    fn get_field(&self, index: usize) -> Option<&FormField>;
}

/// Identifies one entry of the auth field buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFieldId {
    Email,
    Otp,
    Username,
    Password,
    ConfirmPassword,
}

/// Length of the one-time codes sent by the API
pub const OTP_LENGTH: usize = 6;

/// Values entered across every step of one auth flow.
///
/// The buffer lives as long as the flow, so the email typed on the first
/// step is still there when the code is verified and the password is reset.
#[derive(Debug, Clone)]
pub struct AuthFields {
    pub email: FormField,
    pub otp: FormField,
    pub username: FormField,
    pub password: FormField,
    pub confirm_password: FormField,
}

impl AuthFields {
    pub fn new() -> Self {
        Self {
            email: FormField::text("email", "Email"),
            otp: FormField::code("otp", "Verification code", OTP_LENGTH),
            username: FormField::text("username", "Username"),
            password: FormField::secret("password", "Password"),
            confirm_password: FormField::secret("confirm_password", "Confirm password"),
        }
    }

    pub fn get(&self, id: AuthFieldId) -> &FormField {
        match id {
            AuthFieldId::Email => &self.email,
            AuthFieldId::Otp => &self.otp,
            AuthFieldId::Username => &self.username,
            AuthFieldId::Password => &self.password,
            AuthFieldId::ConfirmPassword => &self.confirm_password,
        }
    }

    pub fn get_mut(&mut self, id: AuthFieldId) -> &mut FormField {
        match id {
            AuthFieldId::Email => &mut self.email,
            AuthFieldId::Otp => &mut self.otp,
            AuthFieldId::Username => &mut self.username,
            AuthFieldId::Password => &mut self.password,
            AuthFieldId::ConfirmPassword => &mut self.confirm_password,
        }
    }

    /// Email as sent to the API
    pub fn normalized_email(&self) -> String {
        self.email.as_text().trim().to_lowercase()
    }
}

impl Default for AuthFields {
    fn default() -> Self {
        Self::new()
    }
}
