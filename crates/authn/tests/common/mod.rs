//! Helpers shared by the authn integration tests.

#![allow(dead_code, clippy::expect_used)]

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use mooover_common_authn::{
    FetchError, Jwk, JwkSet, KeySetFetcher, TokenValidator, ValidatorConfig,
};
use parking_lot::Mutex;
use serde_json::json;

pub const ISSUER: &str = "https://issuer.mooover.test/";
pub const AUDIENCE: &str = "https://api.mooover.test";
pub const KID: &str = "k1";

pub const PRIMARY_PEM: &str = include_str!("../fixtures/rsa_primary.pem");
pub const PRIMARY_MODULUS: &str = "jB3rfDg5-AI3LSjFoNCFuP513eb24Y4kWZmBD-xKLb7YPapyv70w_eF0_xrcCSFhWFdxzySmgl6Ct_Ex8bYk56I0v-WDQxTJUky4Re_f-D9KJmYmOfY16VUdLcrGOSa1vxv8w8LeOLr_Hj4mbMOsxZD8sX56lsKrcEmJ7zEseGQx12HjmcXLXygJdlRKu8YuEI2Mvja79X5xChyxH9SE2Lt3dqemj90Rf5TXpcsN70vWO5ziLwLE18GB2PZgrftO4P-Z9A2Sqm3a28hvFot65R_PHpFRcOhREilMYDDTGh2OQarumiqDGas_dImm6ynSyQeeAM_iD6_O1w-XVXDsWQ";

pub const ROTATED_PEM: &str = include_str!("../fixtures/rsa_rotated.pem");
pub const ROTATED_MODULUS: &str = "zB-1JMmUQZzdjLVgbpBOZFdFtg4ZDvZGiNM7e9yiV0Da438vKUVClmntPXqhPFg9VAr_hIcojhHDJzu-6GSN72rJJeJssUKShnKKYhFjZUz7S_7xKg3FQJtF3YmDWTprJ1INtUofh5DvaXiwvefU-sudUImA6Gq4Lpr94fLKtQDGUKkRaaxIJ3-AnlCYebkQnHUotnDAcMUSSvie1dj3OiY9OPtWCwts3jyjseRymG1wiqUeHq-UqpRALwIFhbhf0csIVYz1b6CVp6PT8UsY6W-fJGzdGMyle2emRN3hW9PHTCwMwk-A30-mQ6TnaB19gGWiYHrmow65lueWoY4GHw";

pub fn jwk(kid: &str, modulus: &str) -> Jwk {
    Jwk {
        kty: "RSA".into(),
        kid: Some(kid.into()),
        key_use: Some("sig".into()),
        n: modulus.into(),
        e: "AQAB".into(),
    }
}

pub fn primary_key_set(kid: &str) -> JwkSet {
    JwkSet { keys: vec![jwk(kid, PRIMARY_MODULUS)] }
}

pub fn config() -> ValidatorConfig {
    ValidatorConfig::builder()
        .issuer(ISSUER)
        .audience(AUDIENCE)
        .algorithm("RS256")
        .build()
        .expect("valid config")
}

pub fn claims_expiring_in(seconds: i64) -> serde_json::Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "auth0|walker",
        "exp": now + seconds,
        "iat": now,
    })
}

pub fn valid_claims() -> serde_json::Value {
    claims_expiring_in(3600)
}

/// Signs `claims` with an RSA PEM key.
pub fn sign(algorithm: Algorithm, pem: &str, kid: Option<&str>, claims: &serde_json::Value) -> String {
    let mut header = Header::new(algorithm);
    header.kid = kid.map(str::to_owned);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("RSA PEM");
    jsonwebtoken::encode(&header, claims, &key).expect("Failed to encode test JWT")
}

/// Signs `claims` with the primary key, RS256, under `kid`.
pub fn sign_primary(kid: &str, claims: &serde_json::Value) -> String {
    sign(Algorithm::RS256, PRIMARY_PEM, Some(kid), claims)
}

/// Create a raw JWT string from header and payload JSON (with a fake signature).
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(header_json.to_string().as_bytes());
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json.to_string().as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(b"fake-signature");
    format!("{header_b64}.{payload_b64}.{sig_b64}")
}

/// Serves a replaceable key set and counts fetches.
pub struct StaticFetcher {
    keys: Mutex<JwkSet>,
    failing: Mutex<bool>,
    calls: AtomicU64,
}

impl StaticFetcher {
    pub fn new(keys: JwkSet) -> Arc<Self> {
        Arc::new(Self { keys: Mutex::new(keys), failing: Mutex::new(false), calls: AtomicU64::new(0) })
    }

    pub fn set_keys(&self, keys: JwkSet) {
        *self.keys.lock() = keys;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<JwkSet, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock() {
            return Err(FetchError::transport("connection refused"));
        }
        Ok(self.keys.lock().clone())
    }
}

pub fn validator_with(config: ValidatorConfig, fetcher: &Arc<StaticFetcher>) -> TokenValidator {
    TokenValidator::new(config, Arc::clone(fetcher) as Arc<dyn KeySetFetcher>)
        .expect("valid validator")
}
