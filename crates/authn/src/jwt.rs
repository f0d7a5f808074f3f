//! JWT inspection and verification helpers.
//!
//! # Example
//!
//! ```no_run
//! // Requires a valid JWT token string.
//! use mooover_common_authn::jwt::decode_token_header;
//!
//! # fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let header = decode_token_header(token)?;
//! println!("Algorithm: {}, key: {:?}", header.alg, header.kid);
//! # Ok(())
//! # }
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{config::ValidatorConfig, error::AuthError};

/// The unverified header of a compact JWT.
///
/// `alg` is kept as the raw string so forbidden values such as `"none"`
/// reach the algorithm policy instead of failing to parse.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm name.
    pub alg: String,
    /// Key ID.
    #[serde(default)]
    pub kid: Option<String>,
    /// Token type, usually `"JWT"`.
    #[serde(default)]
    pub typ: Option<String>,
}

/// The `aud` claim, a single string or a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience.
    Single(String),
    /// Several audiences.
    Multiple(Vec<String>),
}

impl Audience {
    /// Returns `true` if `audience` is among the listed audiences.
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

impl Default for Audience {
    fn default() -> Self {
        Audience::Multiple(Vec::new())
    }
}

/// Verified token claims.
///
/// Registered claims that policy checks are typed; everything else is kept
/// in `extra`. `iss`, `aud` and `exp` default when absent so that a missing
/// claim surfaces as a claims failure from validation, not a decode error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    #[serde(default)]
    pub iss: String,
    /// Audience.
    #[serde(default)]
    pub aud: Audience,
    /// Expiration time (seconds since epoch).
    #[serde(default)]
    pub exp: u64,
    /// Subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Issued at (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Not before (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    /// Any other claims (scope, permissions, custom namespaced claims).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenClaims {
    /// Returns the expiry as a UTC timestamp, if representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.exp).ok().and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Decode the JWT header without verification.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if the token is not three
/// dot-separated parts or the header is not base64url-encoded JSON with an
/// `alg` member.
pub fn decode_token_header(token: &str) -> Result<TokenHeader, AuthError> {
    let mut parts = token.split('.');
    let (Some(header), Some(_payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::invalid_token("JWT must have 3 parts separated by dots"));
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| AuthError::invalid_token(format!("Failed to decode JWT header: {e}")))?;

    serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::invalid_token(format!("Failed to parse JWT header: {e}")))
}

/// Build the claim checks for a validation policy.
///
/// Requires `exp`, `iss` and `aud`; checks issuer and audience against
/// the configuration and enforces exactly the configured algorithm.
/// Expiry is checked without leeway.
///
/// # Errors
///
/// Returns [`AuthError::InvalidConfig`] if the configured algorithm is not
/// accepted.
pub fn build_validation(config: &ValidatorConfig) -> Result<Validation, AuthError> {
    let mut validation = Validation::new(config.validation_algorithm()?);
    validation.set_issuer(&[config.issuer()]);
    validation.set_audience(&[config.audience()]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation.validate_exp = true;
    validation.leeway = 0;
    Ok(validation)
}

/// Verify JWT signature and claims with a public key.
///
/// # Errors
///
/// Returns the [`AuthError`] mapped from the verification failure (see
/// `From<jsonwebtoken::errors::Error>`).
pub fn verify_signature(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<TokenClaims, AuthError> {
    let token_data = decode::<TokenClaims>(token, key, validation)?;
    Ok(token_data.claims)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    fn encode_segment(value: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    fn raw_token(header: &serde_json::Value) -> String {
        format!("{}.{}.sig", encode_segment(header), encode_segment(&json!({"iss": "x"})))
    }

    #[test]
    fn test_decode_header_reads_alg_and_kid() {
        let header = decode_token_header(&raw_token(&json!({"alg": "RS256", "kid": "k1", "typ": "JWT"})))
            .expect("valid header");

        assert_eq!(header.alg, "RS256");
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_decode_header_keeps_none_algorithm() {
        let header = decode_token_header(&raw_token(&json!({"alg": "none"}))).expect("parsable");
        assert_eq!(header.alg, "none");
        assert!(header.kid.is_none());
    }

    #[test]
    fn test_decode_header_rejects_wrong_part_count() {
        for token in ["", "abc", "a.b", "a.b.c.d"] {
            assert!(
                matches!(decode_token_header(token), Err(AuthError::InvalidToken(_))),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_decode_header_rejects_bad_base64_and_json() {
        assert!(matches!(decode_token_header("!!!.b.c"), Err(AuthError::InvalidToken(_))));

        let not_json = format!("{}.b.c", URL_SAFE_NO_PAD.encode(b"not json"));
        assert!(matches!(decode_token_header(&not_json), Err(AuthError::InvalidToken(_))));

        let no_alg = raw_token(&json!({"kid": "k1"}));
        assert!(matches!(decode_token_header(&no_alg), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_audience_forms() {
        let claims: TokenClaims = serde_json::from_value(json!({
            "iss": "https://issuer/", "aud": ["a", "b"], "exp": 10, "scope": "read:steps"
        }))
        .unwrap();
        assert!(claims.aud.contains("b"));
        assert!(!claims.aud.contains("c"));
        assert_eq!(claims.extra["scope"], "read:steps");

        let claims: TokenClaims =
            serde_json::from_value(json!({"iss": "https://issuer/", "aud": "a", "exp": 10}))
                .unwrap();
        assert_eq!(claims.aud, Audience::Single("a".into()));
        assert!(claims.sub.is_none());
    }

    #[test]
    fn test_expires_at() {
        let claims: TokenClaims =
            serde_json::from_value(json!({"iss": "i", "aud": "a", "exp": 1_700_000_000u64}))
                .unwrap();
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_build_validation_uses_policy() {
        let config = ValidatorConfig::builder()
            .issuer("https://issuer.example/")
            .audience("api")
            .algorithm("PS384")
            .build()
            .unwrap();

        let validation = build_validation(&config).unwrap();
        assert_eq!(validation.algorithms, vec![jsonwebtoken::Algorithm::PS384]);
        assert!(validation.validate_exp);
        assert_eq!(validation.leeway, 0);
        assert!(validation.iss.as_ref().unwrap().contains("https://issuer.example/"));
        assert!(validation.aud.as_ref().unwrap().contains("api"));
    }
}
