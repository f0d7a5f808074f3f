//! Configuration for [`TokenValidator`](crate::TokenValidator).
//!
//! [`ValidatorConfig`] holds the validation policy (issuer, audience and
//! signing algorithm) plus the key-set cache tuning. It deserializes from
//! the same upper-case keys (`ISSUER`, `AUDIENCE`, `ALGORITHM`) that host
//! applications already keep in their settings.

use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AuthError, Result},
    key_set_cache::{DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT},
    validation::parse_algorithm,
};

/// Path of the key set document relative to the issuer URL.
pub const JWKS_PATH: &str = ".well-known/jwks.json";

/// Validation policy and key-set cache settings.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use mooover_common_authn::ValidatorConfig;
///
/// let config = ValidatorConfig::builder()
///     .issuer("https://mooover.eu.auth0.com/")
///     .audience("https://api.mooover.app")
///     .algorithm("RS256")
///     .cache_ttl(Duration::from_secs(600))
///     .build()?;
///
/// assert_eq!(config.jwks_url(), "https://mooover.eu.auth0.com/.well-known/jwks.json");
/// # Ok::<(), mooover_common_authn::AuthError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Expected `iss` claim; also the base of the key set URL.
    #[serde(alias = "ISSUER")]
    pub(crate) issuer: String,

    /// Expected `aud` claim.
    #[serde(alias = "AUDIENCE")]
    pub(crate) audience: String,

    /// The one signing algorithm tokens must use.
    #[serde(alias = "ALGORITHM")]
    pub(crate) algorithm: String,

    /// How long a fetched key set is considered fresh.
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub(crate) cache_ttl: Duration,

    /// Upper bound on a single key set fetch.
    #[serde(with = "humantime_serde", default = "default_fetch_timeout")]
    pub(crate) fetch_timeout: Duration,

    /// How long past expiry a stale key set may be served when a refresh
    /// fails. Zero fails closed.
    #[serde(with = "humantime_serde", default)]
    pub(crate) stale_grace: Duration,
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_fetch_timeout() -> Duration {
    DEFAULT_FETCH_TIMEOUT
}

#[bon::bon]
impl ValidatorConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `cache_ttl` - Key set freshness window (default: 3600 seconds).
    /// * `fetch_timeout` - Key set fetch deadline (default: 10 seconds).
    /// * `stale_grace` - Stale key set grace window (default: zero, fail closed).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if:
    /// - Issuer, audience, or algorithm is empty
    /// - The algorithm is not an accepted signing algorithm
    /// - `cache_ttl` or `fetch_timeout` is zero
    #[builder]
    pub fn new(
        #[builder(into)] issuer: String,
        #[builder(into)] audience: String,
        #[builder(into)] algorithm: String,
        #[builder(default = DEFAULT_CACHE_TTL)] cache_ttl: Duration,
        #[builder(default = DEFAULT_FETCH_TIMEOUT)] fetch_timeout: Duration,
        #[builder(default)] stale_grace: Duration,
    ) -> Result<Self> {
        let config = Self { issuer, audience, algorithm, cache_ttl, fetch_timeout, stale_grace };
        config.validate()?;
        Ok(config)
    }
}

impl ValidatorConfig {
    /// Checks every field.
    ///
    /// Deserialized configurations are not validated until this runs;
    /// [`TokenValidator::new`](crate::TokenValidator::new) calls it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] naming the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.issuer.is_empty() {
            return Err(AuthError::invalid_config("issuer cannot be empty"));
        }
        if self.audience.is_empty() {
            return Err(AuthError::invalid_config("audience cannot be empty"));
        }
        if self.algorithm.is_empty() {
            return Err(AuthError::invalid_config("algorithm cannot be empty"));
        }
        parse_algorithm(&self.algorithm).map_err(|e| AuthError::invalid_config(e.to_string()))?;
        if self.cache_ttl.is_zero() {
            return Err(AuthError::invalid_config("cache_ttl must be greater than zero"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(AuthError::invalid_config("fetch_timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Returns the expected issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the expected audience.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Returns the configured algorithm name.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the key set freshness window.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Returns the key set fetch deadline.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Returns the stale key set grace window.
    #[must_use]
    pub fn stale_grace(&self) -> Duration {
        self.stale_grace
    }

    /// Returns the key set URL.
    ///
    /// Plain concatenation: issuers are configured with a trailing slash.
    #[must_use]
    pub fn jwks_url(&self) -> String {
        format!("{}{JWKS_PATH}", self.issuer)
    }

    /// Parses the configured algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the algorithm is not accepted.
    pub fn validation_algorithm(&self) -> Result<Algorithm> {
        parse_algorithm(&self.algorithm).map_err(|e| AuthError::invalid_config(e.to_string()))
    }
}
