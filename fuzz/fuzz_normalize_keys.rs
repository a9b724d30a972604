//! Fuzz target for the key tokenizer and JSON normalizer.
//!
//! Run with: cargo +nightly fuzz run fuzz_normalize_keys
//!
//! Feeds arbitrary strings through `to_camel_case` and, when the input parses
//! as JSON, checks that `normalize_keys` holds its idempotence invariant.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let camel = tailsock_core::to_camel_case(s);
    // Tokenization never yields empty segments, so neither should the words
    // of the camelized key.
    assert!(!tailsock_core::tokenize(&camel).iter().any(String::is_empty));

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(s) {
        let once = tailsock_core::normalize_keys(&value);
        assert_eq!(tailsock_core::normalize_keys(&once), once);
    }
});
