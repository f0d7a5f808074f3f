//! Authentication error types.
//!
//! This module defines errors that can occur while validating bearer tokens
//! and fetching the key set that verifies them.
//!
//! Every variant falls into one of two classes:
//!
//! - **Client-caused** failures (bad, expired, or foreign tokens). Hosts reject
//!   the request as unauthenticated and show only [`AuthError::public_message`].
//! - **Infrastructure** failures ([`AuthError::is_server_error`]). The service
//!   could not complete validation; hosts report a server error and may retry
//!   with backoff.

use mooover_common_storage::ErrorKind;
use thiserror::Error;

use crate::jwks::FetchError;

/// Authentication errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions
/// must include a wildcard arm (`_ =>`); match on [`AuthError::kind`] for a
/// closed set.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The bearer token is empty.
    #[error("Missing bearer token")]
    MissingToken,

    /// No key in the key set matches the token's `kid`.
    #[error("Signing key not found: {kid}")]
    KeyNotFound {
        /// Key ID from the token header.
        kid: String,
    },

    /// Token `exp` has passed.
    #[error("Token expired")]
    TokenExpired,

    /// Issuer, audience, or another registered claim does not match policy.
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    /// Malformed token or bad signature.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Algorithm forbidden or not in the accepted list.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The key set could not be fetched and no usable cached copy exists.
    #[error("Failed to fetch key set from {url}")]
    KeyFetchFailed {
        /// Key set URL that was requested.
        url: String,
        /// Underlying fetch failure.
        #[source]
        source: FetchError,
    },

    /// Unexpected failure while building key material or verifying.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Validator configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims(message.into())
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken(message.into())
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported_algorithm(message: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm(message.into())
    }

    /// Creates a new `KeyFetchFailed` error.
    #[must_use]
    pub fn key_fetch_failed(url: impl Into<String>, source: FetchError) -> Self {
        Self::KeyFetchFailed { url: url.into(), source }
    }

    /// Creates a new `ValidationError` error.
    #[must_use]
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// Creates a new `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns the shared taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingToken => ErrorKind::NoContent,
            AuthError::KeyNotFound { .. } | AuthError::KeyFetchFailed { .. } => ErrorKind::NotFound,
            AuthError::TokenExpired
            | AuthError::InvalidClaims(_)
            | AuthError::InvalidToken(_)
            | AuthError::UnsupportedAlgorithm(_)
            | AuthError::ValidationError(_)
            | AuthError::InvalidConfig(_) => ErrorKind::InvalidContent,
        }
    }

    /// Returns `true` if the service, not the caller, caused this failure.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AuthError::KeyFetchFailed { .. }
                | AuthError::ValidationError(_)
                | AuthError::InvalidConfig(_)
        )
    }

    /// Returns a message safe to show to the end caller.
    ///
    /// Client errors map to fixed strings that carry no token contents or
    /// internal detail. Server errors return the full message; hosts should
    /// log it and show a generic server error instead.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            AuthError::MissingToken => "Authorization token is missing".to_owned(),
            AuthError::KeyNotFound { .. } => "Unable to find appropriate key".to_owned(),
            AuthError::TokenExpired => "Token is expired".to_owned(),
            AuthError::InvalidClaims(_) => "Invalid claims, check audience and issuer".to_owned(),
            AuthError::InvalidToken(_) | AuthError::UnsupportedAlgorithm(_) => {
                "Token is invalid".to_owned()
            },
            _ => self.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidIssuer => AuthError::invalid_claims("issuer validation failed"),
            ErrorKind::InvalidAudience => AuthError::invalid_claims("audience validation failed"),
            ErrorKind::InvalidSubject => AuthError::invalid_claims("subject validation failed"),
            ErrorKind::ImmatureSignature => AuthError::invalid_claims("token is not yet valid"),
            ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::invalid_claims(format!("missing required claim '{claim}'"))
            },
            ErrorKind::InvalidToken => AuthError::invalid_token("invalid JWT structure"),
            ErrorKind::InvalidSignature => AuthError::invalid_token("signature verification failed"),
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => {
                AuthError::invalid_token("algorithm does not match the verification key")
            },
            ErrorKind::Base64(e) => AuthError::invalid_token(format!("invalid base64: {e}")),
            ErrorKind::Json(e) => AuthError::invalid_token(format!("invalid JSON: {e}")),
            ErrorKind::Utf8(e) => AuthError::invalid_token(format!("invalid UTF-8: {e}")),
            _ => AuthError::validation_error(format!("JWT error: {err}")),
        }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
