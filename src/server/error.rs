use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::server::utils::{packer_utils::UnpackError, token_utils::TokenError};

pub type AppResult<T> = Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InternalServerErrorWithContext(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Unpack(#[from] UnpackError),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Token(TokenError::InvalidHeader(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Token(_) => StatusCode::BAD_REQUEST,
            Error::InternalServerErrorWithContext(_)
            | Error::Unpack(_)
            | Error::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// every error leaves with `{"error": "..."}` and an open cors header so players can read it
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{} - {}", status, self);
        }

        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        response
    }
}
