//! # Rejections
//!
//! Every way an authentication can fail, and how each one is written back to
//! the client. The response body is always a JSON string literal; the status
//! is always a non-success code.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use super::basic::FormatError;

pub const INVALID_FORMAT_MESSAGE: &str = "Invalid credentials format.";
pub const USERNAME_NOT_FOUND_MESSAGE: &str = "Username not found.";
pub const WRONG_PASSWORD_MESSAGE: &str = "Wrong Password.";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Error";

/// Outcome of a failed authentication.
///
/// Internal variants carry no error text: the cause is logged where it
/// happens and never reaches the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthRejection {
    /// The Authorization header is missing or malformed
    #[error("invalid credentials format: {0}")]
    InvalidFormat(FormatError),

    /// The credential store failed or did not answer in time
    #[error("credential store unavailable")]
    StoreUnavailable,

    /// No credential record exists for the username
    #[error("username not found")]
    UserNotFound,

    /// The stored item could not be read as a credential record
    #[error("credential record could not be decoded")]
    MalformedRecord,

    /// The supplied secret does not match the stored hash
    #[error("wrong password")]
    WrongPassword,
}

impl From<FormatError> for AuthRejection {
    fn from(err: FormatError) -> Self {
        Self::InvalidFormat(err)
    }
}

impl AuthRejection {
    /// Client-facing message
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => INVALID_FORMAT_MESSAGE,
            Self::UserNotFound => USERNAME_NOT_FOUND_MESSAGE,
            Self::WrongPassword => WRONG_PASSWORD_MESSAGE,
            Self::StoreUnavailable | Self::MalformedRecord => INTERNAL_ERROR_MESSAGE,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidFormat(_) | Self::UserNotFound | Self::WrongPassword => {
                StatusCode::UNAUTHORIZED
            }
            Self::StoreUnavailable | Self::MalformedRecord => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for logs and audit events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "invalid_format",
            Self::StoreUnavailable => "store_unavailable",
            Self::UserNotFound => "user_not_found",
            Self::MalformedRecord => "malformed_record",
            Self::WrongPassword => "wrong_password",
        }
    }

    /// Response with a `WWW-Authenticate` challenge for `realm` on 401s
    pub fn into_challenge_response(self, realm: &str) -> Response {
        let challenge = self.status_code() == StatusCode::UNAUTHORIZED;
        let mut response = self.into_response();
        if challenge {
            if let Ok(value) = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm)) {
                response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        reject(self.status_code(), self.message())
    }
}

/// Write `message` as a JSON string body with `status`.
///
/// If the message cannot be serialized the response is a bare 500.
pub fn reject(status: StatusCode, message: &str) -> Response {
    match serde_json::to_string(message) {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Couldn't serialize rejection message: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
