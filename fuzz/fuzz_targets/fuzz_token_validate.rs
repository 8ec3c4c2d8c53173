#![no_main]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use parcelkeep::token::TokenService;

const SECRET: &[u8] = b"fuzzing-secret-fuzzing-secret-32";

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(service) = TokenService::new(SECRET, Duration::from_secs(3600), "http://localhost") else {
        return;
    };
    let Some(now) = Utc.timestamp_opt(1_770_000_000, 0).single() else {
        return;
    };

    // Arbitrary input must never validate: only minted tokens carry a
    // valid signature.
    assert!(service.validate(token, now).is_err());
});
