//! Fuzz testing for bearer token extraction and verification.
//!
//! Ensures that, for any `Authorization` header value:
//!
//! - `extract_bearer_token` never panics and never returns an empty token
//! - `verify` never panics and rejects everything not signed with the secret
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_token -- -max_total_time=60
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use tollgate::token::{VerifyOptions, extract_bearer_token, verify};

const SECRET: &str = "fuzz-secret";

fuzz_target!(|data: &[u8]| {
    let Ok(header) = std::str::from_utf8(data) else {
        return;
    };

    if let Some(token) = extract_bearer_token(Some(header)) {
        assert!(!token.is_empty());
        assert_eq!(token, token.trim());

        // Arbitrary input is never a valid signature for the secret
        assert!(verify(&token, SECRET, &VerifyOptions::default()).is_err());
    }
});
