#![no_main]

use beads_core::id::IdGenerator;
use libfuzzer_sys::fuzz_target;

const IDS: &[&str] = &["bd-a1b2", "bd-a1c3", "bd-zz9", "bd-0000"];

fuzz_target!(|input: &str| {
    let ids = IdGenerator::new("bd");
    if let Ok(id) = ids.resolve(input, IDS.iter().copied()) {
        assert!(IDS.contains(&id.as_str()));
    }
});
