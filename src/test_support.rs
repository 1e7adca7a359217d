//! Helpers for driving the full router in tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    app::build_app,
    auth::{
        repo::{memory::MemoryUserRepo, RepoResult, UserRepo},
        repo_types::{
            NewUser, PasswordHash, PreferenceChanges, Preferences, ProfileChanges, User,
        },
    },
    state::AppState,
};

pub const ADA_PASSWORD: &str = "Passw0rd";

pub async fn send(
    state: &AppState,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = build_app(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Registers the canonical example user; returns its id and session token.
pub async fn register_ada(state: &AppState) -> (Uuid, String) {
    let (status, body) = send(
        state,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "name": "Ada L",
            "username": "ada_l",
            "email": "ada@example.com",
            "password": ADA_PASSWORD,
            "confirmPassword": ADA_PASSWORD
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["user"]["id"].as_str().unwrap().parse().unwrap();
    let token = body["data"]["token"].as_str().unwrap().to_string();
    (id, token)
}

type Hook = Box<dyn FnOnce(&MemoryUserRepo) + Send>;

/// Memory store that runs an armed hook right before the next write, i.e.
/// after the handler has done all of its reads. Models another request
/// landing in between.
pub struct InterleavingRepo {
    inner: Arc<MemoryUserRepo>,
    hook: Mutex<Option<Hook>>,
}

impl InterleavingRepo {
    pub fn state() -> (AppState, Arc<Self>) {
        let repo = Arc::new(Self {
            inner: Arc::new(MemoryUserRepo::default()),
            hook: Mutex::new(None),
        });
        (AppState::with_test_config(repo.clone()), repo)
    }

    pub fn inner(&self) -> &MemoryUserRepo {
        &self.inner
    }

    pub fn before_next_write(&self, hook: impl FnOnce(&MemoryUserRepo) + Send + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    fn fire(&self) {
        let hook = self.hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&self.inner);
        }
    }
}

#[async_trait]
impl UserRepo for InterleavingRepo {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> RepoResult<Option<User>> {
        self.inner.find_by_email_or_username(email, username).await
    }

    async fn email_taken_by_other(&self, email: &str, id: Uuid) -> RepoResult<bool> {
        self.inner.email_taken_by_other(email, id).await
    }

    async fn username_taken_by_other(&self, username: &str, id: Uuid) -> RepoResult<bool> {
        self.inner.username_taken_by_other(username, id).await
    }

    async fn create(&self, new: NewUser) -> RepoResult<User> {
        self.fire();
        self.inner.create(new).await
    }

    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> RepoResult<User> {
        self.fire();
        self.inner.update_profile(id, changes).await
    }

    async fn update_preferences(
        &self,
        id: Uuid,
        changes: PreferenceChanges,
    ) -> RepoResult<Preferences> {
        self.fire();
        self.inner.update_preferences(id, changes).await
    }

    async fn set_password(&self, id: Uuid, hash: &PasswordHash) -> RepoResult<()> {
        self.fire();
        self.inner.set_password(id, hash).await
    }

    async fn start_password_reset(
        &self,
        id: Uuid,
        digest: &str,
        expires_at: OffsetDateTime,
    ) -> RepoResult<()> {
        self.fire();
        self.inner.start_password_reset(id, digest, expires_at).await
    }

    async fn complete_password_reset(
        &self,
        digest: &str,
        now: OffsetDateTime,
        hash: &PasswordHash,
    ) -> RepoResult<Option<User>> {
        self.fire();
        self.inner.complete_password_reset(digest, now, hash).await
    }

    async fn deactivate(&self, id: Uuid) -> RepoResult<()> {
        self.fire();
        self.inner.deactivate(id).await
    }
}
