use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{auth::repo::RepoError, response::ApiResponse, validation::FieldError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation. Rendered as 400, not 409.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Duplicate { field } => {
                AppError::Conflict(format!("This {field} is already in use"))
            }
            RepoError::NotFound => AppError::NotFound("User not found".into()),
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => ApiResponse::failure("Validation failed", Some(errors)),
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => ApiResponse::failure(msg, None),
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                ApiResponse::failure("Internal server error", None)
            }
        };
        (status, Json(body)).into_response()
    }
}

/// JSON body extractor whose failures are rendered as the error envelope.
///
/// An absent body, or one sent without a JSON content type, decodes as `{}`
/// so that required fields surface as field errors from the validators.
/// A value of the wrong type is reported against its path in the body.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = has_json_content_type(req.headers());
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            warn!(error = %e, "failed to read request body");
            AppError::BadRequest("Invalid request body".into())
        })?;

        let body: &[u8] = if !is_json || bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };
        decode_body(body).map(AppJson)
    }
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    let de = &mut serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(de).map_err(|err| {
        debug!(error = %err, "rejected request body");
        match err.inner().classify() {
            Category::Data => {
                let path = err.path().to_string();
                let field = if path == "." { "body".to_string() } else { path };
                AppError::Validation(vec![FieldError::new(field, "Invalid value")])
            }
            Category::Syntax | Category::Eof | Category::Io => {
                AppError::BadRequest("Request body is not valid JSON".into())
            }
        }
    })
}
