//! # Basic-Auth Header Decoding
//!
//! Turns an `Authorization` header value into a username/secret pair. Every
//! malformed input becomes a [`FormatError`]; nothing here panics.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use thiserror::Error;

const BASIC_SCHEME: &str = "basic";

/// Decoded Basic credentials
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Why a header value could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("authorization header is missing")]
    MissingHeader,

    #[error("authorization header is not valid ASCII")]
    NotAscii,

    #[error("unsupported authorization scheme")]
    UnsupportedScheme,

    #[error("credentials are not valid base64")]
    InvalidBase64,

    #[error("credentials are not valid UTF-8")]
    InvalidUtf8,

    #[error("credentials have no ':' separator")]
    MissingSeparator,

    #[error("username is empty")]
    EmptyUsername,
}

impl BasicCredentials {
    /// Decode an `Authorization` header value.
    ///
    /// Accepts `Basic <base64>` with a case-insensitive scheme, or a bare
    /// base64 token for hosts that strip the scheme before invoking the gate.
    /// The decoded text is split on the first `:`, so secrets may contain `:`.
    pub fn decode(header_value: &str) -> Result<Self, FormatError> {
        let encoded = strip_scheme(header_value.trim())?;

        let decoded = STANDARD
            .decode(encoded)
            .map_err(|_| FormatError::InvalidBase64)?;
        let decoded = String::from_utf8(decoded).map_err(|_| FormatError::InvalidUtf8)?;

        let (username, secret) = decoded
            .split_once(':')
            .ok_or(FormatError::MissingSeparator)?;

        if username.is_empty() {
            return Err(FormatError::EmptyUsername);
        }

        Ok(Self {
            username: username.to_string(),
            secret: secret.to_string(),
        })
    }

    /// Encode as a full `Authorization` header value
    pub fn encode(&self) -> String {
        encode_header(&self.username, &self.secret)
    }
}

/// `Basic <base64(username:secret)>`
pub fn encode_header(username: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, secret)))
}

fn strip_scheme(value: &str) -> Result<&str, FormatError> {
    match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) => {
            if scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
                Ok(rest.trim_start())
            } else {
                Err(FormatError::UnsupportedScheme)
            }
        }
        None => Ok(value),
    }
}
