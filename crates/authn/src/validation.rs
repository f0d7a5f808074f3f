//! JWT algorithm validation.
//!
//! This module provides security checks for JWT algorithms, ensuring only
//! RSA signature algorithms that a key set's `{n, e}` components can verify
//! are accepted.
//!
//! # Security
//!
//! - Strict algorithm checks to prevent algorithm substitution attacks
//! - Symmetric algorithms and "none" are always rejected
//! - A token must be signed with exactly the configured algorithm

use jsonwebtoken::Algorithm;

use crate::error::AuthError;

/// Forbidden JWT algorithms that are never accepted for security reasons.
///
/// - `none`: No signature verification (trivially bypassable)
/// - `HS256`, `HS384`, `HS512`: Symmetric algorithms. A verifier holding only
///   a public key would treat that key as the shared secret.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted JWT algorithms: the RSA family verifiable with `{n, e}` keys.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["RS256", "RS384", "RS512", "PS256", "PS384", "PS512"];

/// Validate a JWT algorithm name against security policies.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] if the algorithm is
/// forbidden or not in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use mooover_common_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("RS256").is_ok());
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("EdDSA").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.iter().any(|forbidden| forbidden.eq_ignore_ascii_case(alg)) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{alg}' is not in accepted list"
        )));
    }

    Ok(())
}

/// Parses an accepted algorithm name.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] under the same rules as
/// [`validate_algorithm`].
pub fn parse_algorithm(alg: &str) -> Result<Algorithm, AuthError> {
    validate_algorithm(alg)?;
    alg.parse::<Algorithm>()
        .map_err(|_| AuthError::unsupported_algorithm(format!("Algorithm '{alg}' is not recognized")))
}

/// Checks a token header's algorithm against the configured one.
///
/// The header algorithm must first pass [`validate_algorithm`]; an accepted
/// but different algorithm is still rejected, since the key set only
/// vouches for keys used with the configured algorithm.
///
/// # Errors
///
/// - [`AuthError::UnsupportedAlgorithm`] if the header algorithm is not accepted
/// - [`AuthError::InvalidToken`] if it differs from `configured`
pub fn validate_header_algorithm(header_alg: &str, configured: Algorithm) -> Result<(), AuthError> {
    let alg = parse_algorithm(header_alg)?;
    if alg != configured {
        return Err(AuthError::invalid_token(format!(
            "token algorithm '{header_alg}' does not match configured algorithm '{configured:?}'"
        )));
    }
    Ok(())
}
