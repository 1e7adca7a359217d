use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{
    auth::{jwt::JwtKeys, repo_types::User},
    error::AppError,
    state::AppState,
};

/// Auth guard: resolves the bearer token to an active user.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();

        // Expect "Bearer <token>"; the prefix goes before any trimming so a
        // bare "Bearer " counts as no token.
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .unwrap_or(header)
            .trim();
        if token.is_empty() {
            return Err(AppError::Unauthorized("No access token provided".into()));
        }

        let user_id = JwtKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            AppError::Unauthorized("Invalid token".into())
        })?;

        match state.users.find_by_id(user_id).await? {
            Some(user) if user.is_active => Ok(AuthUser(user)),
            _ => {
                warn!(%user_id, "token for missing or inactive user");
                Err(AppError::Unauthorized("User not found".into()))
            }
        }
    }
}
