use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthPayload, ForgotPasswordRequest, LoginRequest, RegisterRequest,
            ResetPasswordRequest, ResetTokenPayload,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        repo_types::{NewUser, PasswordHash, User},
        reset_token,
    },
    error::{AppError, AppJson, AppResult},
    response::ApiResponse,
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:token", post(reset_password))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
}

fn issue(state: &AppState, user: User) -> AppResult<AuthPayload> {
    let token = JwtKeys::from_ref(state).sign(user.id)?;
    Ok(AuthPayload { user, token })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthPayload>>)> {
    payload.validate()?;

    if state
        .users
        .find_by_email_or_username(&payload.email, &payload.username)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, username = %payload.username, "email or username taken");
        return Err(AppError::Conflict(
            "Email or username is already in use".into(),
        ));
    }

    let new = NewUser::new(
        payload.name,
        payload.username,
        payload.email,
        &payload.password,
    )?;
    let user = state.users.create(new).await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    let body = issue(&state, user)?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Registration successful", body),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthPayload>>> {
    payload.validate()?;

    // Unknown email, inactive account and wrong password share one message.
    let user = match state.users.find_by_email(&payload.email).await? {
        Some(u) if u.is_active => u,
        _ => {
            warn!(email = %payload.email, "login for unknown or inactive account");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
    };

    if !user.password_matches(&payload.password)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    info!(user_id = %user.id, "user logged in");
    Ok(ApiResponse::ok("Login successful", issue(&state, user)?))
}

/// Issues a reset token. Delivery by email is not wired up, so the plaintext
/// token is returned in the response body.
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<ForgotPasswordRequest>,
) -> AppResult<Json<ApiResponse<ResetTokenPayload>>> {
    payload.validate()?;

    let Some(user) = state.users.find_by_email(&payload.email).await? else {
        warn!(email = %payload.email, "password reset for unknown email");
        return Err(AppError::NotFound(
            "No user is registered with this email address".into(),
        ));
    };

    let token = reset_token::generate();
    let expires_at =
        OffsetDateTime::now_utc() + TimeDuration::minutes(state.config.reset_token_ttl_minutes);
    state
        .users
        .start_password_reset(user.id, &reset_token::digest(&token), expires_at)
        .await?;

    info!(user_id = %user.id, %expires_at, "password reset requested");
    Ok(ApiResponse::ok(
        "Password reset token generated",
        ResetTokenPayload { reset_token: token },
    ))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> AppResult<Json<ApiResponse<AuthPayload>>> {
    payload.validate()?;

    let hash = PasswordHash::new(&payload.password)?;
    let digest = reset_token::digest(&token);
    let Some(user) = state
        .users
        .complete_password_reset(&digest, OffsetDateTime::now_utc(), &hash)
        .await?
    else {
        warn!("invalid or expired reset token");
        return Err(AppError::BadRequest("Invalid or expired token".into()));
    };

    info!(user_id = %user.id, "password reset completed");
    Ok(ApiResponse::ok(
        "Password updated successfully",
        issue(&state, user)?,
    ))
}

#[instrument(skip_all)]
pub async fn me(AuthUser(user): AuthUser) -> Json<ApiResponse<User>> {
    ApiResponse::ok("Current user", user)
}

/// Tokens are stateless; there is nothing to invalidate server-side.
#[instrument(skip_all)]
pub async fn logout(AuthUser(user): AuthUser) -> Json<ApiResponse<()>> {
    info!(user_id = %user.id, "user logged out");
    ApiResponse::message("Logged out successfully")
}
