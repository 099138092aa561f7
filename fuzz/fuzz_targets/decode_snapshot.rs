#![no_main]

use std::path::Path;

use beads_core::persist::{decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(items) = decode(data, Path::new("fuzz.json")) else {
        return;
    };
    // Anything that decodes must re-encode and decode to the same items.
    let refs: Vec<_> = items.iter().collect();
    let bytes = encode(&refs).expect("decoded items re-encode");
    let again = decode(&bytes, Path::new("fuzz.json")).expect("re-encoded snapshot decodes");
    assert_eq!(items, again);
});
