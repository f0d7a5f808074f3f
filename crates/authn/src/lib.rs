//! # Mooover Common Authentication
//!
//! Bearer-token validation for Mooover services.
//!
//! This crate provides:
//! - **Token validation**: signature, issuer, audience and expiry checks
//! - **Key set cache**: lazily refreshed JWKS with single-flight fetches
//! - **Algorithm validation**: security checks for JWT algorithms
//!
//! ## Features
//!
//! - Only RSA signature algorithms (RS*, PS*) are supported
//! - Symmetric algorithms (HS256, etc.) and `none` are explicitly rejected
//! - Errors split into client-caused rejections and server-side failures
//!
//! ## Example
//!
//! ```no_run
//! use mooover_common_authn::{TokenValidator, ValidatorConfig};
//!
//! # async fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ValidatorConfig::builder()
//!     .issuer("https://mooover.eu.auth0.com/")
//!     .audience("https://api.mooover.app")
//!     .algorithm("RS256")
//!     .build()?;
//! let validator = TokenValidator::with_http_fetcher(config)?;
//!
//! let claims = validator.verify(token).await?;
//! println!("Verified subject: {}", claims.sub.unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (fixture RSA keys, token signing, a scriptable
//!   key set fetcher, `assert_auth_error!`).
//! - **`failpoints`**: Enables fail point injection sites for fault-injection tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Validator configuration.
pub mod config;
/// Authentication error types.
pub mod error;
/// Key sets and the fetcher collaborator.
pub mod jwks;
/// JWT inspection and verification helpers.
pub mod jwt;
/// Time-based key set cache.
pub mod key_set_cache;
/// Shared test helpers.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
/// Algorithm validation.
pub mod validation;
/// Token validator.
pub mod validator;

// Re-export key types for convenience
pub use config::ValidatorConfig;
pub use error::{AuthError, Result};
pub use jwks::{DEFAULT_MAX_BODY_BYTES, FetchError, HttpKeySetFetcher, Jwk, JwkSet, KeySetFetcher};
pub use jwt::TokenClaims;
pub use key_set_cache::{DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT, KeySetCache};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
pub use validator::TokenValidator;
