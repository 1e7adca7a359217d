use serde::Deserialize;
use serde_json::Value;

use crate::{
    auth::repo_types::{PreferenceChanges, ProfileChanges},
    error::{AppError, AppResult},
    validation::{normalize_email, Validator},
};

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UpdateProfileRequest {
    /// Only fields that are present are normalized and checked.
    pub fn validate(&mut self) -> AppResult<()> {
        let mut v = Validator::new();
        if let Some(name) = self.name.as_mut() {
            *name = name.trim().to_string();
            v.name("name", name);
        }
        if let Some(username) = self.username.as_mut() {
            *username = username.trim().to_string();
            v.username("username", username);
        }
        if let Some(email) = self.email.as_mut() {
            *email = normalize_email(email);
            v.email("email", email);
        }
        v.finish()
    }

    pub fn into_changes(self) -> ProfileChanges {
        ProfileChanges {
            name: self.name,
            username: self.username,
            email: self.email,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.current_password.is_empty()
            || self.new_password.is_empty()
            || self.confirm_password.is_empty()
        {
            return Err(AppError::BadRequest("All fields are required".into()));
        }
        if self.new_password != self.confirm_password {
            return Err(AppError::BadRequest("New passwords do not match".into()));
        }
        if self.new_password.chars().count() < 6 {
            return Err(AppError::BadRequest(
                "New password must be at least 6 characters".into(),
            ));
        }
        Ok(())
    }
}

/// Raw values: anything that is not a JSON boolean is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub notifications: Option<Value>,
    #[serde(default)]
    pub dark_mode: Option<Value>,
}

impl UpdateSettingsRequest {
    pub fn into_changes(self) -> PreferenceChanges {
        PreferenceChanges {
            notifications: self.notifications.as_ref().and_then(Value::as_bool),
            dark_mode: self.dark_mode.as_ref().and_then(Value::as_bool),
        }
    }
}
