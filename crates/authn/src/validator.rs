//! Bearer-token validation against the issuer's cached key set.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, Validation};

use crate::{
    config::ValidatorConfig,
    error::{AuthError, Result},
    jwks::{HttpKeySetFetcher, KeySetFetcher},
    jwt::{TokenClaims, build_validation, decode_token_header, verify_signature},
    key_set_cache::KeySetCache,
    validation::validate_header_algorithm,
};

/// Validates compact signed tokens issued by one issuer.
///
/// The validator owns a [`KeySetCache`] for the issuer's key set. It is
/// `Send + Sync`; share one instance per process via [`Arc`].
///
/// # Pipeline
///
/// 1. Obtain the key set from the cache, fetching it if stale
/// 2. Read the unverified header for `alg` and `kid`
/// 3. Find the key whose `kid` matches
/// 4. Build verification key material from its `{n, e}` components
/// 5. Verify signature, issuer, audience and expiry
/// 6. Map failures onto [`AuthError`]
///
/// # Example
///
/// ```no_run
/// use mooover_common_authn::{TokenValidator, ValidatorConfig};
///
/// # async fn example(token: &str) -> Result<(), mooover_common_authn::AuthError> {
/// let config = ValidatorConfig::builder()
///     .issuer("https://mooover.eu.auth0.com/")
///     .audience("https://api.mooover.app")
///     .algorithm("RS256")
///     .build()?;
/// let validator = TokenValidator::with_http_fetcher(config)?;
///
/// match validator.validate(token).await {
///     Ok(()) => println!("authenticated"),
///     Err(e) if e.is_server_error() => eprintln!("server error: {e}"),
///     Err(e) => eprintln!("rejected: {}", e.public_message()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TokenValidator {
    config: ValidatorConfig,
    algorithm: Algorithm,
    validation: Validation,
    jwks_url: String,
    keys: KeySetCache,
}

impl TokenValidator {
    /// Creates a validator that fetches key sets through `fetcher`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: ValidatorConfig, fetcher: Arc<dyn KeySetFetcher>) -> Result<Self> {
        config.validate()?;
        let algorithm = config.validation_algorithm()?;
        let validation = build_validation(&config)?;
        let keys = KeySetCache::new(fetcher, config.cache_ttl())
            .with_fetch_timeout(config.fetch_timeout())
            .with_stale_grace(config.stale_grace());

        Ok(Self { jwks_url: config.jwks_url(), config, algorithm, validation, keys })
    }

    /// Creates a validator that fetches key sets over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if `config` fails validation or
    /// the HTTP client cannot be built.
    pub fn with_http_fetcher(config: ValidatorConfig) -> Result<Self> {
        let fetcher = HttpKeySetFetcher::new(config.fetch_timeout())?;
        Self::new(config, Arc::new(fetcher))
    }

    /// Validates `token`, discarding its claims.
    ///
    /// # Errors
    ///
    /// See [`verify`](Self::verify).
    pub async fn validate(&self, token: &str) -> Result<()> {
        self.verify(token).await.map(|_| ())
    }

    /// Validates `token` and returns its verified claims.
    ///
    /// # Errors
    ///
    /// Client-caused failures:
    /// - [`AuthError::MissingToken`] if `token` is empty
    /// - [`AuthError::InvalidToken`] if the token is malformed, lacks a `kid`,
    ///   uses a different algorithm than configured, or its signature fails
    /// - [`AuthError::UnsupportedAlgorithm`] if the header algorithm is forbidden
    /// - [`AuthError::KeyNotFound`] if no key matches the `kid`
    /// - [`AuthError::TokenExpired`] if `exp` has passed
    /// - [`AuthError::InvalidClaims`] if issuer or audience do not match
    ///
    /// Infrastructure failures:
    /// - [`AuthError::KeyFetchFailed`] if the key set is unavailable
    /// - [`AuthError::ValidationError`] if the matched key is unusable
    #[tracing::instrument(skip_all, fields(kid))]
    pub async fn verify(&self, token: &str) -> Result<TokenClaims> {
        let result = self.verify_inner(token).await;
        if let Err(ref e) = result {
            if e.is_server_error() {
                tracing::error!(
                    error = %e,
                    source = ?std::error::Error::source(e),
                    "token validation could not complete"
                );
            } else {
                tracing::warn!(kind = %e.kind(), reason = %e, "token rejected");
            }
        }
        result
    }

    async fn verify_inner(&self, token: &str) -> Result<TokenClaims> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let keys = self.keys.get(&self.jwks_url).await?;

        let header = decode_token_header(token)?;
        validate_header_algorithm(&header.alg, self.algorithm)?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::invalid_token("JWT header missing 'kid' field"))?;
        tracing::Span::current().record("kid", kid.as_str());

        let jwk = keys.find(&kid).ok_or_else(|| AuthError::key_not_found(kid.as_str()))?;
        let decoding_key = jwk.to_decoding_key()?;

        let claims = verify_signature(token, &decoding_key, &self.validation)?;
        tracing::debug!(expires_at = ?claims.expires_at(), "token verified");
        Ok(claims)
    }

    /// Drops the cached key set so the next validation refetches it.
    pub fn invalidate_keys(&self) {
        self.keys.invalidate();
    }

    /// Returns the validator's configuration.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Returns the key set cache.
    #[must_use]
    pub fn key_cache(&self) -> &KeySetCache {
        &self.keys
    }
}
