use axum::{
    extract::State,
    routing::{delete, get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        extractors::AuthUser,
        repo_types::{PasswordHash, Preferences, User},
    },
    error::{AppError, AppJson, AppResult},
    response::ApiResponse,
    state::AppState,
};

use super::dto::{ChangePasswordRequest, UpdateProfileRequest, UpdateSettingsRequest};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/profile", get(get_profile).put(update_profile))
        .route("/users/password", put(change_password))
        .route("/users/settings", get(get_settings).put(update_settings))
        .route("/users/account", delete(deactivate_account))
}

#[instrument(skip_all)]
pub async fn get_profile(AuthUser(user): AuthUser) -> Json<ApiResponse<User>> {
    ApiResponse::ok("Profile", user)
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(mut payload): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    payload.validate()?;

    if let Some(email) = payload.email.as_deref() {
        if email != user.email && state.users.email_taken_by_other(email, user.id).await? {
            warn!(user_id = %user.id, "profile email already in use");
            return Err(AppError::Conflict("This email is already in use".into()));
        }
    }
    if let Some(username) = payload.username.as_deref() {
        if username != user.username
            && state.users.username_taken_by_other(username, user.id).await?
        {
            warn!(user_id = %user.id, "profile username already in use");
            return Err(AppError::Conflict("This username is already in use".into()));
        }
    }

    // The unique indexes have the final say if another request won the race.
    let user = state
        .users
        .update_profile(user.id, &payload.into_changes())
        .await?;
    info!(user_id = %user.id, "profile updated");
    Ok(ApiResponse::ok("Profile updated successfully", user))
}

#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    payload.validate()?;

    if !user.password_matches(&payload.current_password)? {
        warn!(user_id = %user.id, "password change with wrong current password");
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }

    let hash = PasswordHash::new(&payload.new_password)?;
    state.users.set_password(user.id, &hash).await?;
    info!(user_id = %user.id, "password changed");
    Ok(ApiResponse::message("Password updated successfully"))
}

#[instrument(skip_all)]
pub async fn get_settings(AuthUser(user): AuthUser) -> Json<ApiResponse<Preferences>> {
    ApiResponse::ok("User settings", user.preferences)
}

#[instrument(skip_all)]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<UpdateSettingsRequest>,
) -> AppResult<Json<ApiResponse<Preferences>>> {
    let preferences = state
        .users
        .update_preferences(user.id, payload.into_changes())
        .await?;
    info!(user_id = %user.id, "settings updated");
    Ok(ApiResponse::ok("Settings updated successfully", preferences))
}

/// Soft delete: the record stays, the account stops authenticating.
#[instrument(skip_all)]
pub async fn deactivate_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<ApiResponse<()>>> {
    state.users.deactivate(user.id).await?;
    info!(user_id = %user.id, "account deactivated");
    Ok(ApiResponse::message("Account deactivated successfully"))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::auth::{repo::UserRepo, repo_types::NewUser};
    use crate::state::AppState;
    use crate::test_support::{register_ada, send, InterleavingRepo, ADA_PASSWORD};

    async fn register_other(state: &AppState) -> String {
        let (status, body) = send(
            state,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "name": "Grace H",
                "username": "grace_h",
                "email": "grace@example.com",
                "password": "C0bolRules",
                "confirmPassword": "C0bolRules"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn profile_requires_token() {
        let (state, _repo) = AppState::fake();
        let (status, body) = send(&state, Method::GET, "/api/users/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn get_profile_returns_owner() {
        let (state, _repo) = AppState::fake();
        let (id, token) = register_ada(&state).await;
        let (status, body) =
            send(&state, Method::GET, "/api/users/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], id.to_string());
        assert_eq!(body["data"]["name"], "Ada L");
    }

    #[tokio::test]
    async fn update_profile_conflicts_with_other_user_but_not_self() {
        let (state, _repo) = AppState::fake();
        let (_, ada) = register_ada(&state).await;
        register_other(&state).await;

        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/users/profile",
            Some(&ada),
            Some(json!({"email": "GRACE@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "This email is already in use");

        let (status, _) = send(
            &state,
            Method::PUT,
            "/api/users/profile",
            Some(&ada),
            Some(json!({"username": "grace_h"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/users/profile",
            Some(&ada),
            Some(json!({"email": "ada@example.com", "username": "ada_l", "name": "Ada Lovelace"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Ada Lovelace");
        assert_eq!(body["data"]["username"], "ada_l");
    }

    #[tokio::test]
    async fn update_profile_validates_present_fields() {
        let (state, _repo) = AppState::fake();
        let (_, token) = register_ada(&state).await;
        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/users/profile",
            Some(&token),
            Some(json!({"username": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "username");
    }

    #[tokio::test]
    async fn change_password_checks_current_and_applies_new() {
        let (state, _repo) = AppState::fake();
        let (_, token) = register_ada(&state).await;

        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/users/password",
            Some(&token),
            Some(json!({
                "currentPassword": "NotMine1",
                "newPassword": "fresh-secret",
                "confirmPassword": "fresh-secret"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Current password is incorrect");

        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/users/password",
            Some(&token),
            Some(json!({
                "currentPassword": ADA_PASSWORD,
                "newPassword": "fresh-secret",
                "confirmPassword": "fresh-secret"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("data").is_none());

        let (status, _) = send(
            &state,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ada@example.com", "password": "fresh-secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn settings_ignore_non_boolean_values() {
        let (state, _repo) = AppState::fake();
        let (_, token) = register_ada(&state).await;

        let (status, body) =
            send(&state, Method::GET, "/api/users/settings", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"notifications": true, "darkMode": false}));

        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/users/settings",
            Some(&token),
            Some(json!({"notifications": "no", "darkMode": true, "extra": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"notifications": true, "darkMode": true}));

        let (_, body) = send(
            &state,
            Method::PUT,
            "/api/users/settings",
            Some(&token),
            Some(json!({"notifications": false, "darkMode": 0})),
        )
        .await;
        assert_eq!(body["data"], json!({"notifications": false, "darkMode": true}));
    }

    #[tokio::test]
    async fn deactivate_keeps_record_and_blocks_auth() {
        let (state, repo) = AppState::fake();
        let (id, token) = register_ada(&state).await;

        let (status, _) =
            send(&state, Method::DELETE, "/api/users/account", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let stored = repo.find_by_id(id).await.unwrap().expect("record kept");
        assert!(!stored.is_active);
        assert_eq!(stored.email, "ada@example.com");

        let (status, _) =
            send(&state, Method::GET, "/api/users/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &state,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ada@example.com", "password": ADA_PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn settings_without_body_are_a_no_op() {
        let (state, _repo) = AppState::fake();
        let (_, token) = register_ada(&state).await;

        let (status, body) =
            send(&state, Method::PUT, "/api/users/settings", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"notifications": true, "darkMode": false}));
    }

    #[tokio::test]
    async fn profile_field_of_wrong_type_is_a_field_error() {
        let (state, _repo) = AppState::fake();
        let (_, token) = register_ada(&state).await;

        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/users/profile",
            Some(&token),
            Some(json!({"name": 42})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"][0]["field"], "name");
    }

    #[tokio::test]
    async fn settings_update_does_not_revive_account_deactivated_mid_request() {
        let (state, repo) = InterleavingRepo::state();
        let (id, token) = register_ada(&state).await;

        repo.before_next_write(move |inner| inner.update(id, |u| u.is_active = false));
        let (status, _) = send(
            &state,
            Method::PUT,
            "/api/users/settings",
            Some(&token),
            Some(json!({"darkMode": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let stored = repo.inner().find_by_id(id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert!(stored.preferences.dark_mode);

        let (status, _) =
            send(&state, Method::GET, "/api/users/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile_update_does_not_revive_account_deactivated_mid_request() {
        let (state, repo) = InterleavingRepo::state();
        let (id, token) = register_ada(&state).await;

        repo.before_next_write(move |inner| inner.update(id, |u| u.is_active = false));
        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/users/profile",
            Some(&token),
            Some(json!({"name": "Ada Lovelace"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["isActive"], false);

        let stored = repo.inner().find_by_id(id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn profile_race_lost_at_the_store_is_a_conflict() {
        let (state, repo) = InterleavingRepo::state();
        let (id, token) = register_ada(&state).await;

        repo.before_next_write(|inner| {
            let rival = NewUser::new(
                "Grace H".into(),
                "grace_h".into(),
                "grace@example.com".into(),
                "C0bolRules",
            )
            .unwrap();
            inner.insert(rival).unwrap();
        });
        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/users/profile",
            Some(&token),
            Some(json!({"email": "grace@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "This email is already in use");

        let stored = repo.inner().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.email, "ada@example.com");
    }

    #[tokio::test]
    async fn password_change_invalidates_pending_reset_token() {
        let (state, _repo) = AppState::fake();
        let (_, token) = register_ada(&state).await;

        let (_, body) = send(
            &state,
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({"email": "ada@example.com"})),
        )
        .await;
        let reset_token = body["data"]["resetToken"].as_str().unwrap().to_string();

        let (status, _) = send(
            &state,
            Method::PUT,
            "/api/users/password",
            Some(&token),
            Some(json!({
                "currentPassword": ADA_PASSWORD,
                "newPassword": "fresh-secret",
                "confirmPassword": "fresh-secret"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &state,
            Method::POST,
            &format!("/api/auth/reset-password/{reset_token}"),
            None,
            Some(json!({"password": "An0therOne", "confirmPassword": "An0therOne"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid or expired token");
    }
}
