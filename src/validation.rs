use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::AppError;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9._]+$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Cow<'static, str>,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Collects field errors for one request body.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, field: &'static str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn name(&mut self, field: &'static str, value: &str) -> &mut Self {
        let len = value.chars().count();
        if !(2..=50).contains(&len) {
            self.push(field, "Name must be between 2 and 50 characters");
        }
        self
    }

    pub fn username(&mut self, field: &'static str, value: &str) -> &mut Self {
        let len = value.chars().count();
        if !(3..=20).contains(&len) {
            self.push(field, "Username must be between 3 and 20 characters");
        }
        if !USERNAME_RE.is_match(value) {
            self.push(
                field,
                "Username may only contain letters, digits, dots and underscores",
            );
        }
        self
    }

    pub fn email(&mut self, field: &'static str, value: &str) -> &mut Self {
        if !is_valid_email(value) {
            self.push(field, "Enter a valid email address");
        }
        self
    }

    pub fn required(&mut self, field: &'static str, value: &str, message: &str) -> &mut Self {
        if value.is_empty() {
            self.push(field, message);
        }
        self
    }

    pub fn strong_password(&mut self, field: &'static str, value: &str) -> &mut Self {
        if value.chars().count() < 6 {
            self.push(field, "Password must be at least 6 characters");
        }
        if !is_strong_password(value) {
            self.push(
                field,
                "Password must contain an uppercase letter, a lowercase letter and a digit",
            );
        }
        self
    }

    pub fn matches(&mut self, field: &'static str, value: &str, expected: &str) -> &mut Self {
        if value != expected {
            self.push(field, "Passwords do not match");
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn is_strong_password(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
}
