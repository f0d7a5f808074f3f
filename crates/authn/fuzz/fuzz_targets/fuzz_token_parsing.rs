//! Fuzz target for untrusted token and key set input.
//!
//! Feeds arbitrary bytes as a compact token and as a key set document.
//! Every result must be either `Ok(...)` or `Err(...)`, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mooover_common_authn::{JwkSet, jwt::decode_token_header, validate_algorithm};

fuzz_target!(|data: &[u8]| {
    if let Ok(token) = std::str::from_utf8(data)
        && let Ok(header) = decode_token_header(token)
    {
        let _ = validate_algorithm(&header.alg);
    }

    if let Ok(keys) = serde_json::from_slice::<JwkSet>(data) {
        for jwk in &keys.keys {
            let _ = jwk.to_decoding_key();
        }
        if let Some(kid) = keys.keys.first().and_then(|jwk| jwk.kid.as_deref()) {
            let _ = keys.find(kid);
        }
    }
});
