//! Form field value objects

/// How a field's value is shown on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldKind {
    #[default]
    Text,
    /// Passwords, rendered as bullets
    Secret,
    /// One-time codes, digits only
    Code { max_len: usize },
}

/// Represents a single form field with its configuration and value
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub value: String,
    pub kind: FieldKind,
}

impl FormField {
    /// Create a new text field
    pub fn text(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            value: String::new(),
            kind: FieldKind::Text,
        }
    }

    /// Create a new masked field
    pub fn secret(name: &str, label: &str) -> Self {
        Self {
            kind: FieldKind::Secret,
            ..Self::text(name, label)
        }
    }

    /// Create a new numeric code field
    pub fn code(name: &str, label: &str, max_len: usize) -> Self {
        Self {
            kind: FieldKind::Code { max_len },
            ..Self::text(name, label)
        }
    }

    pub fn as_text(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub fn set_text(&mut self, value: String) {
        self.value = value;
    }

    /// Push a character to the field value
    pub fn push_char(&mut self, c: char) {
        match self.kind {
            FieldKind::Code { max_len } => {
                if c.is_ascii_digit() && self.value.len() < max_len {
                    self.value.push(c);
                }
            }
            FieldKind::Text | FieldKind::Secret => self.value.push(c),
        }
    }

    /// Remove the last character from the field value
    pub fn pop_char(&mut self) {
        self.value.pop();
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    /// Get the display value for rendering
    pub fn display_value(&self) -> String {
        match self.kind {
            FieldKind::Secret => "•".repeat(self.value.chars().count()),
            FieldKind::Text | FieldKind::Code { .. } => self.value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_field_accepts_any_char() {
        let mut field = FormField::text("email", "Email");
        for c in "a@b.io".chars() {
            field.push_char(c);
        }
        assert_eq!(field.as_text(), "a@b.io");
    }

    #[test]
    fn test_code_field_rejects_non_digits_and_caps_length() {
        let mut field = FormField::code("otp", "Code", 4);
        for c in "1a2b345".chars() {
            field.push_char(c);
        }
        assert_eq!(field.as_text(), "1234");
    }

    #[test]
    fn test_secret_field_is_masked() {
        let mut field = FormField::secret("password", "Password");
        field.set_text("hunter2".to_string());
        assert_eq!(field.display_value(), "•••••••");
        assert_eq!(field.as_text(), "hunter2");
    }

    #[test]
    fn test_pop_and_clear() {
        let mut field = FormField::text("username", "Username");
        field.set_text("trader".to_string());
        field.pop_char();
        assert_eq!(field.as_text(), "trade");
        field.clear();
        assert!(field.is_empty());
    }

    #[test]
    fn test_whitespace_only_counts_as_empty() {
        let mut field = FormField::text("username", "Username");
        field.set_text("   ".to_string());
        assert!(field.is_empty());
    }
}
