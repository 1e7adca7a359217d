use serde::{Deserialize, Serialize};

use crate::{
    auth::repo_types::User,
    error::AppResult,
    validation::{normalize_email, Validator},
};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl RegisterRequest {
    /// Trims and normalizes in place, then applies the registration rules.
    pub fn validate(&mut self) -> AppResult<()> {
        self.name = self.name.trim().to_string();
        self.username = self.username.trim().to_string();
        self.email = normalize_email(&self.email);
        Validator::new()
            .name("name", &self.name)
            .username("username", &self.username)
            .email("email", &self.email)
            .strong_password("password", &self.password)
            .matches("confirmPassword", &self.confirm_password, &self.password)
            .finish()
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&mut self) -> AppResult<()> {
        self.email = normalize_email(&self.email);
        Validator::new()
            .email("email", &self.email)
            .required("password", &self.password, "Password is required")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn validate(&mut self) -> AppResult<()> {
        self.email = normalize_email(&self.email);
        Validator::new().email("email", &self.email).finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> AppResult<()> {
        Validator::new()
            .strong_password("password", &self.password)
            .matches("confirmPassword", &self.confirm_password, &self.password)
            .finish()
    }
}

/// Returned by register, login and reset-password.
#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTokenPayload {
    pub reset_token: String,
}
