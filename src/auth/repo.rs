use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{
    NewUser, PasswordHash, PreferenceChanges, Preferences, ProfileChanges, User, UserRow,
};

#[derive(Debug, Error)]
pub enum RepoError {
    /// Unique index on `field` rejected the write.
    #[error("duplicate {field}")]
    Duplicate { field: &'static str },

    #[error("user not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence for user records. Uniqueness of `email` and `username` is
/// enforced by the store itself; callers' pre-checks are only a fast path.
///
/// Every write touches only the columns its operation owns, so concurrent
/// requests on the same user cannot undo each other's unrelated changes.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn find_by_email_or_username(&self, email: &str, username: &str)
        -> RepoResult<Option<User>>;
    async fn email_taken_by_other(&self, email: &str, id: Uuid) -> RepoResult<bool>;
    async fn username_taken_by_other(&self, username: &str, id: Uuid) -> RepoResult<bool>;
    async fn create(&self, new: NewUser) -> RepoResult<User>;
    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> RepoResult<User>;
    async fn update_preferences(
        &self,
        id: Uuid,
        changes: PreferenceChanges,
    ) -> RepoResult<Preferences>;
    /// Replaces the credential and drops any pending reset token.
    async fn set_password(&self, id: Uuid, hash: &PasswordHash) -> RepoResult<()>;
    async fn start_password_reset(
        &self,
        id: Uuid,
        digest: &str,
        expires_at: OffsetDateTime,
    ) -> RepoResult<()>;
    /// Sets a new credential on the user holding `digest`, if its window is
    /// still open at `now`, and consumes the token in the same write.
    async fn complete_password_reset(
        &self,
        digest: &str,
        now: OffsetDateTime,
        hash: &PasswordHash,
    ) -> RepoResult<Option<User>>;
    async fn deactivate(&self, id: Uuid) -> RepoResult<()>;
}

const USER_COLUMNS: &str = "id, name, username, email, password_hash, is_active, notifications, \
     dark_mode, reset_password_token, reset_password_expire, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_error(e: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some(c) if c.contains("username") => "username",
                _ => "email",
            };
            return RepoError::Duplicate { field };
        }
    }
    RepoError::Database(e)
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> RepoResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $2 LIMIT 1"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .bind(username)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    async fn email_taken_by_other(&self, email: &str, id: Uuid) -> RepoResult<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND id <> $2)"#,
        )
        .bind(email)
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(taken)
    }

    async fn username_taken_by_other(&self, username: &str, id: Uuid) -> RepoResult<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 AND id <> $2)"#,
        )
        .bind(username)
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(taken)
    }

    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let prefs = Preferences::default();
        let sql = format!(
            "INSERT INTO users (id, name, username, email, password_hash, notifications, dark_mode)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.name)
            .bind(&new.username)
            .bind(&new.email)
            .bind(new.password_hash.as_str())
            .bind(prefs.notifications)
            .bind(prefs.dark_mode)
            .fetch_one(&self.db)
            .await
            .map_err(map_write_error)?;
        Ok(row.into())
    }

    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> RepoResult<User> {
        let sql = format!(
            "UPDATE users
                SET name = COALESCE($2, name),
                    username = COALESCE($3, username),
                    email = COALESCE($4, email),
                    updated_at = now()
              WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(changes.name.as_deref())
            .bind(changes.username.as_deref())
            .bind(changes.email.as_deref())
            .fetch_optional(&self.db)
            .await
            .map_err(map_write_error)?;
        row.map(User::from).ok_or(RepoError::NotFound)
    }

    async fn update_preferences(
        &self,
        id: Uuid,
        changes: PreferenceChanges,
    ) -> RepoResult<Preferences> {
        let row: Option<(bool, bool)> = sqlx::query_as(
            r#"UPDATE users
                  SET notifications = COALESCE($2, notifications),
                      dark_mode = COALESCE($3, dark_mode),
                      updated_at = now()
                WHERE id = $1
               RETURNING notifications, dark_mode"#,
        )
        .bind(id)
        .bind(changes.notifications)
        .bind(changes.dark_mode)
        .fetch_optional(&self.db)
        .await?;
        let (notifications, dark_mode) = row.ok_or(RepoError::NotFound)?;
        Ok(Preferences {
            notifications,
            dark_mode,
        })
    }

    async fn set_password(&self, id: Uuid, hash: &PasswordHash) -> RepoResult<()> {
        let done = sqlx::query(
            r#"UPDATE users
                  SET password_hash = $2,
                      reset_password_token = NULL,
                      reset_password_expire = NULL,
                      updated_at = now()
                WHERE id = $1"#,
        )
        .bind(id)
        .bind(hash.as_str())
        .execute(&self.db)
        .await?;
        expect_one_row(done.rows_affected())
    }

    async fn start_password_reset(
        &self,
        id: Uuid,
        digest: &str,
        expires_at: OffsetDateTime,
    ) -> RepoResult<()> {
        let done = sqlx::query(
            r#"UPDATE users
                  SET reset_password_token = $2,
                      reset_password_expire = $3,
                      updated_at = now()
                WHERE id = $1"#,
        )
        .bind(id)
        .bind(digest)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        expect_one_row(done.rows_affected())
    }

    async fn complete_password_reset(
        &self,
        digest: &str,
        now: OffsetDateTime,
        hash: &PasswordHash,
    ) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users
                SET password_hash = $3,
                    reset_password_token = NULL,
                    reset_password_expire = NULL,
                    updated_at = now()
              WHERE reset_password_token = $1 AND reset_password_expire > $2
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(digest)
            .bind(now)
            .bind(hash.as_str())
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    async fn deactivate(&self, id: Uuid) -> RepoResult<()> {
        let done = sqlx::query(
            "UPDATE users SET is_active = false, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        expect_one_row(done.rows_affected())
    }
}

fn expect_one_row(rows: u64) -> RepoResult<()> {
    if rows == 0 {
        Err(RepoError::NotFound)
    } else {
        Ok(())
    }
}
