//! Shared test utilities for token validation testing.
//!
//! Provides fixed RSA key pairs, token signing helpers, raw token crafting
//! (for attack testing), and a scriptable [`KeySetFetcher`]. Feature-gated
//! behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! mooover-common-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use mooover_common_authn::testutil::{TEST_KID, sign_token, valid_claims};
//!
//! let token = sign_token(TEST_KID, &valid_claims());
//! ```

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::json;

use crate::{
    config::ValidatorConfig,
    jwks::{FetchError, Jwk, JwkSet, KeySetFetcher},
};

/// Issuer used by [`test_config`] and [`valid_claims`].
pub const TEST_ISSUER: &str = "https://issuer.mooover.test/";

/// Audience used by [`test_config`] and [`valid_claims`].
pub const TEST_AUDIENCE: &str = "https://api.mooover.test";

/// Key ID of the primary fixture key.
pub const TEST_KID: &str = "test-key-1";

/// Primary RSA-2048 private key (PKCS#1 PEM).
pub const RSA_PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/rsa_primary.pem");

/// Base64url modulus of [`RSA_PRIVATE_KEY_PEM`].
pub const RSA_MODULUS: &str = "jB3rfDg5-AI3LSjFoNCFuP513eb24Y4kWZmBD-xKLb7YPapyv70w_eF0_xrcCSFhWFdxzySmgl6Ct_Ex8bYk56I0v-WDQxTJUky4Re_f-D9KJmYmOfY16VUdLcrGOSa1vxv8w8LeOLr_Hj4mbMOsxZD8sX56lsKrcEmJ7zEseGQx12HjmcXLXygJdlRKu8YuEI2Mvja79X5xChyxH9SE2Lt3dqemj90Rf5TXpcsN70vWO5ziLwLE18GB2PZgrftO4P-Z9A2Sqm3a28hvFot65R_PHpFRcOhREilMYDDTGh2OQarumiqDGas_dImm6ynSyQeeAM_iD6_O1w-XVXDsWQ";

/// A second RSA-2048 private key, for wrong-key and rotation tests.
pub const ROTATED_RSA_PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/rsa_rotated.pem");

/// Base64url modulus of [`ROTATED_RSA_PRIVATE_KEY_PEM`].
pub const ROTATED_RSA_MODULUS: &str = "zB-1JMmUQZzdjLVgbpBOZFdFtg4ZDvZGiNM7e9yiV0Da438vKUVClmntPXqhPFg9VAr_hIcojhHDJzu-6GSN72rJJeJssUKShnKKYhFjZUz7S_7xKg3FQJtF3YmDWTprJ1INtUofh5DvaXiwvefU-sudUImA6Gq4Lpr94fLKtQDGUKkRaaxIJ3-AnlCYebkQnHUotnDAcMUSSvie1dj3OiY9OPtWCwts3jyjseRymG1wiqUeHq-UqpRALwIFhbhf0csIVYz1b6CVp6PT8UsY6W-fJGzdGMyle2emRN3hW9PHTCwMwk-A30-mQ6TnaB19gGWiYHrmow65lueWoY4GHw";

/// Public exponent shared by both fixture keys (65537).
pub const RSA_EXPONENT: &str = "AQAB";

/// Returns an RS256 configuration for [`TEST_ISSUER`] and [`TEST_AUDIENCE`].
///
/// # Panics
///
/// Never panics; the fixed values are valid.
#[must_use]
pub fn test_config() -> ValidatorConfig {
    ValidatorConfig::builder()
        .issuer(TEST_ISSUER)
        .audience(TEST_AUDIENCE)
        .algorithm("RS256")
        .build()
        .expect("fixture config is valid")
}

/// Returns the public JWK of the primary fixture key under `kid`.
#[must_use]
pub fn rsa_jwk(kid: &str) -> Jwk {
    jwk_with_modulus(kid, RSA_MODULUS)
}

/// Returns a public JWK with the given modulus under `kid`.
#[must_use]
pub fn jwk_with_modulus(kid: &str, modulus: &str) -> Jwk {
    Jwk {
        kty: "RSA".into(),
        kid: Some(kid.into()),
        key_use: Some("sig".into()),
        n: modulus.into(),
        e: RSA_EXPONENT.into(),
    }
}

/// Returns a key set holding the primary fixture key under each `kid`.
#[must_use]
pub fn rsa_jwk_set(kids: &[&str]) -> JwkSet {
    JwkSet { keys: kids.iter().map(|kid| rsa_jwk(kid)).collect() }
}

/// Returns claims that satisfy [`test_config`], expiring in one hour.
#[must_use]
pub fn valid_claims() -> serde_json::Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": TEST_ISSUER,
        "aud": TEST_AUDIENCE,
        "sub": "auth0|test-user",
        "exp": now + 3600,
        "iat": now,
    })
}

/// Signs `claims` with the primary fixture key using RS256.
#[must_use]
pub fn sign_token(kid: &str, claims: &serde_json::Value) -> String {
    sign_token_with(Algorithm::RS256, RSA_PRIVATE_KEY_PEM, Some(kid), claims)
}

/// Signs `claims` with an RSA PEM key and algorithm.
///
/// # Panics
///
/// Panics if `pem` is not an RSA private key or encoding fails.
#[must_use]
pub fn sign_token_with(
    algorithm: Algorithm,
    pem: &str,
    kid: Option<&str>,
    claims: &serde_json::Value,
) -> String {
    let mut header = Header::new(algorithm);
    header.kid = kid.map(str::to_owned);

    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture PEM is an RSA key");
    jsonwebtoken::encode(&header, claims, &key).expect("Failed to encode test JWT")
}

/// Creates a raw JWT string from header and payload JSON with a fake
/// signature.
#[must_use]
pub fn craft_raw_jwt(header: &serde_json::Value, payload: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string().as_bytes());
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(b"fake-signature");
    format!("{header_b64}.{payload_b64}.{sig_b64}")
}

/// A [`KeySetFetcher`] that serves a replaceable key set and counts calls.
#[derive(Debug)]
pub struct CountingFetcher {
    keys: Mutex<JwkSet>,
    failure: Mutex<Option<u16>>,
    delay: Duration,
    calls: AtomicU64,
    last_url: Mutex<Option<String>>,
}

impl CountingFetcher {
    /// Creates a fetcher serving `keys`.
    #[must_use]
    pub fn new(keys: JwkSet) -> Self {
        Self {
            keys: Mutex::new(keys),
            failure: Mutex::new(None),
            delay: Duration::ZERO,
            calls: AtomicU64::new(0),
            last_url: Mutex::new(None),
        }
    }

    /// Makes every fetch sleep for `delay` first.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replaces the served key set.
    pub fn set_keys(&self, keys: JwkSet) {
        *self.keys.lock() = keys;
    }

    /// Makes fetches fail with the given HTTP status, or succeed on `None`.
    pub fn set_failure(&self, status: Option<u16>) {
        *self.failure.lock() = status;
    }

    /// Returns the number of fetches received.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the URL of the most recent fetch.
    #[must_use]
    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().clone()
    }
}

#[async_trait]
impl KeySetFetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<JwkSet, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock() = Some(url.to_owned());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(status) = *self.failure.lock() {
            return Err(FetchError::Status { status });
        }
        Ok(self.keys.lock().clone())
    }
}

/// Assert that an authentication result failed with the given
/// [`AuthError`](crate::AuthError) variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use mooover_common_authn::{AuthError, assert_auth_error};
///
/// let result: Result<(), AuthError> = Err(AuthError::TokenExpired);
/// assert_auth_error!(result, TokenExpired);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
}
