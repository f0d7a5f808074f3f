//! JSON Web Key Sets and the collaborator that fetches them.
//!
//! A key set is published by the token issuer at
//! `{issuer}.well-known/jwks.json` and holds the RSA public keys that
//! verify its tokens. [`KeySetFetcher`] abstracts the fetch so validation
//! logic is testable without network access; [`HttpKeySetFetcher`] is the
//! production implementation.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use mooover_common_storage::BoxError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AuthError, Result};

/// A single public key from a key set.
///
/// Only RSA keys carry the `n`/`e` components this crate verifies with.
/// Unknown members of the JSON object are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, `"RSA"` for verifiable keys.
    pub kty: String,
    /// Key ID matched against the token header's `kid`.
    #[serde(default)]
    pub kid: Option<String>,
    /// Intended use, typically `"sig"`.
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
    /// RSA modulus, base64url-encoded.
    #[serde(default)]
    pub n: String,
    /// RSA public exponent, base64url-encoded.
    #[serde(default)]
    pub e: String,
}

impl Jwk {
    /// Builds verification key material from the RSA components.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ValidationError`] if the key is not an RSA key
    /// or its components are empty or malformed.
    pub fn to_decoding_key(&self) -> Result<DecodingKey> {
        if self.kty != "RSA" {
            return Err(AuthError::validation_error(format!(
                "unsupported key type '{}' for key '{}'",
                self.kty,
                self.kid.as_deref().unwrap_or_default()
            )));
        }
        if self.n.is_empty() || self.e.is_empty() {
            return Err(AuthError::validation_error("RSA key is missing its modulus or exponent"));
        }

        DecodingKey::from_rsa_components(&self.n, &self.e)
            .map_err(|e| AuthError::validation_error(format!("invalid RSA key components: {e}")))
    }
}

/// A published set of keys, `{"keys": [...]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// The keys, in publication order.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Returns the first key whose `kid` equals `kid`.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid.as_deref() == Some(kid))
    }

    /// Returns the number of keys in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the set holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Errors from fetching a key set.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The request could not be sent or the response could not be read.
    #[error("Key set request failed: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
        /// The underlying transport error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The endpoint answered with a non-success status.
    #[error("Key set endpoint returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response body is not a key set.
    #[error("Key set response could not be decoded: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
        /// The underlying decode error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The response body exceeds the fetcher's size limit.
    #[error("Key set response exceeds {limit} bytes")]
    BodyTooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The fetch did not complete within its deadline.
    #[error("Key set fetch timed out after {timeout:?}")]
    Timeout {
        /// The deadline that elapsed.
        timeout: Duration,
    },
}

impl FetchError {
    /// Creates a new `Transport` error with no source.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), source: None }
    }

    /// Creates a new `Decode` error with no source.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into(), source: None }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return FetchError::Status { status: status.as_u16() };
        }
        FetchError::Transport { message: err.to_string(), source: Some(Arc::new(err)) }
    }
}

/// Fetches a key set from a URL.
///
/// Implementations must be cancel-safe: the cache wraps every call in a
/// deadline and drops the future when it elapses.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    /// Fetches and decodes the key set published at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] on transport failure, a non-2xx status, or
    /// a body that is not a key set.
    async fn fetch(&self, url: &str) -> std::result::Result<JwkSet, FetchError>;
}

/// Default upper bound on a key set response body (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Fetches key sets over HTTP(S) with `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpKeySetFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpKeySetFetcher {
    /// Creates a fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the HTTP client cannot be
    /// built (e.g. no TLS backend is available).
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::invalid_config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client, max_body_bytes: DEFAULT_MAX_BODY_BYTES }
    }

    /// Sets the largest response body accepted, in bytes.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str) -> std::result::Result<JwkSet, FetchError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::BodyTooLarge { limit });
        }

        // Content-Length may be absent or wrong; enforce the limit while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::BodyTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        let keys: JwkSet = serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
            message: e.to_string(),
            source: Some(Arc::new(e)),
        })?;

        tracing::debug!(keys = keys.len(), "fetched key set");
        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rsa_jwk(kid: &str) -> Jwk {
        Jwk {
            kty: "RSA".into(),
            kid: Some(kid.into()),
            key_use: Some("sig".into()),
            n: "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw".into(),
            e: "AQAB".into(),
        }
    }

    #[test]
    fn test_key_set_decodes_and_ignores_extra_members() {
        let keys: JwkSet = serde_json::from_value(json!({
            "keys": [
                {"kty": "RSA", "kid": "k1", "use": "sig", "alg": "RS256", "n": "abc", "e": "AQAB",
                 "x5c": ["MIIC..."]},
                {"kty": "EC", "kid": "k2", "crv": "P-256", "x": "f83", "y": "x_F"}
            ]
        }))
        .expect("valid key set");

        assert_eq!(keys.len(), 2);
        assert_eq!(keys.find("k1").expect("k1").key_use.as_deref(), Some("sig"));
        assert_eq!(keys.find("k2").expect("k2").kty, "EC");
        assert!(keys.find("k3").is_none());
    }

    #[test]
    fn test_find_returns_first_match() {
        let mut second = rsa_jwk("dup");
        second.e = "AQAC".into();
        let keys = JwkSet { keys: vec![rsa_jwk("dup"), second] };

        assert_eq!(keys.find("dup").expect("dup").e, "AQAB");
    }

    #[test]
    fn test_rsa_key_converts() {
        assert!(rsa_jwk("k1").to_decoding_key().is_ok());
    }

    #[test]
    fn test_non_rsa_key_rejected() {
        let mut jwk = rsa_jwk("k1");
        jwk.kty = "EC".into();

        let result = jwk.to_decoding_key();
        assert!(matches!(result, Err(AuthError::ValidationError(ref msg)) if msg.contains("EC")));
    }

    #[test]
    fn test_missing_components_rejected() {
        let mut jwk = rsa_jwk("k1");
        jwk.n.clear();

        assert!(matches!(jwk.to_decoding_key(), Err(AuthError::ValidationError(_))));
    }

    #[test]
    fn test_malformed_components_rejected() {
        let mut jwk = rsa_jwk("k1");
        jwk.n = "!!not base64!!".into();

        assert!(matches!(jwk.to_decoding_key(), Err(AuthError::ValidationError(_))));
    }

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::Status { status: 404 }.to_string(), "Key set endpoint returned HTTP 404");
        assert_eq!(
            FetchError::Timeout { timeout: Duration::from_secs(10) }.to_string(),
            "Key set fetch timed out after 10s"
        );
        assert_eq!(
            FetchError::BodyTooLarge { limit: 1024 }.to_string(),
            "Key set response exceeds 1024 bytes"
        );
        assert_eq!(
            FetchError::transport("connection refused").to_string(),
            "Key set request failed: connection refused"
        );
    }
}
