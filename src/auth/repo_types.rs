use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub notifications: bool,
    pub dark_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            dark_mode: false,
        }
    }
}

/// User record. Serializes without the credential or reset-token fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub(crate) password_hash: String,
    pub is_active: bool,
    pub preferences: Preferences,
    #[serde(skip_serializing)]
    pub reset_password_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_password_expire: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn password_matches(&self, plain: &str) -> anyhow::Result<bool> {
        verify_password(plain, &self.password_hash)
    }

    pub fn reset_token_valid_at(&self, token_digest: &str, now: OffsetDateTime) -> bool {
        self.reset_password_token.as_deref() == Some(token_digest)
            && self.reset_password_expire.is_some_and(|exp| exp > now)
    }
}

/// Stored form of a credential. Only obtainable by hashing a plaintext, so
/// the store never sees a password it could write verbatim.
#[derive(Debug, Clone)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(plain: &str) -> anyhow::Result<Self> {
        hash_password(plain).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHash,
}

impl NewUser {
    pub fn new(
        name: String,
        username: String,
        email: String,
        password: &str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            name,
            username,
            email,
            password_hash: PasswordHash::new(password)?,
        })
    }
}

/// Profile fields to overwrite; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PreferenceChanges {
    pub notifications: Option<bool>,
    pub dark_mode: Option<bool>,
}

/// Flat row as stored in the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub notifications: bool,
    pub dark_mode: bool,
    pub reset_password_token: Option<String>,
    pub reset_password_expire: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            is_active: r.is_active,
            preferences: Preferences {
                notifications: r.notifications,
                dark_mode: r.dark_mode,
            },
            reset_password_token: r.reset_password_token,
            reset_password_expire: r.reset_password_expire,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_user(password: &str) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        name: "Ada L".into(),
        username: "ada_l".into(),
        email: "ada@example.com".into(),
        password_hash: hash_password(password).unwrap(),
        is_active: true,
        preferences: Preferences::default(),
        reset_password_token: None,
        reset_password_expire: None,
        created_at: now,
        updated_at: now,
    }
}
