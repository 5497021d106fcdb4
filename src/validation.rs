//! Request field checks. Failures are collected per field and returned to the
//! client under `errors`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
        )
        .expect("Invalid email regex")
    })
}

pub const NAME_MAX: usize = 50;
pub const EMAIL_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 20;
pub const TOKEN_MAX: usize = 255;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Accumulates the first failure per field.
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, field: &str, message: String) {
        self.errors.0.entry(field.to_string()).or_insert(message);
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.fail(field, format!("Field {field} must be filled"));
        }
        self
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.fail(
                field,
                format!("Field {field} must have a maximum length of {max} characters"),
            );
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.is_empty() && !is_valid_email(value) {
            self.fail(field, format!("Invalid email address for field {field}"));
        }
        self
    }

    /// 8 to 20 characters with at least one letter and one digit.
    pub fn password(&mut self, field: &str, value: &str) -> &mut Self {
        let len = value.chars().count();
        if len < PASSWORD_MIN {
            self.fail(
                field,
                format!("Field {field} must have a minimum length of {PASSWORD_MIN} characters"),
            );
        } else if len > PASSWORD_MAX {
            self.fail(
                field,
                format!("Field {field} must have a maximum length of {PASSWORD_MAX} characters"),
            );
        } else if !value.chars().any(|c| c.is_ascii_alphabetic())
            || !value.chars().any(|c| c.is_ascii_digit())
        {
            self.fail(
                field,
                format!("Field {field} must contain at least 1 letter and 1 number"),
            );
        }
        self
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        if !allowed.contains(&value) {
            self.fail(field, format!("Invalid value for field {field}"));
        }
        self
    }

    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        if value < min || value > max {
            self.fail(field, format!("Field {field} must be between {min} and {max}"));
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), ValidationErrors> {
        let errors = std::mem::take(&mut self.errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    email_regex().is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_registration_fields() {
        let result = Validator::new()
            .required("name", "fake name")
            .max_len("name", "fake name", NAME_MAX)
            .required("email", "fake@example.com")
            .email("email", "fake@example.com")
            .password("password", "password1")
            .finish();
        assert!(result.is_ok());
    }

    #[test]
    fn password_rules() {
        let cases = [
            ("short1", "minimum length of 8"),
            ("waytoolongpassword12345", "maximum length of 20"),
            ("password", "at least 1 letter and 1 number"),
            ("12345678", "at least 1 letter and 1 number"),
        ];
        for (password, expected) in cases {
            let errors = Validator::new()
                .password("password", password)
                .finish()
                .expect_err("password should be rejected");
            let message = errors.get("password").expect("password error");
            assert!(message.contains(expected), "{password}: {message}");
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("fake@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
        assert!(!is_valid_email("fake"));
        assert!(!is_valid_email("fake@"));
        assert!(!is_valid_email("fake@example"));
        assert!(!is_valid_email("fake @example.com"));
    }

    #[test]
    fn keeps_first_error_per_field() {
        let errors = Validator::new()
            .required("email", "")
            .email("email", "")
            .required("name", " ")
            .finish()
            .expect_err("missing fields");

        assert_eq!(errors.get("email"), Some("Field email must be filled"));
        assert_eq!(errors.get("name"), Some("Field name must be filled"));
        assert_eq!(errors.fields().count(), 2);
    }
}
