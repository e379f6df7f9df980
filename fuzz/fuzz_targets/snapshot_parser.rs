#![no_main]

use idveil::config::ConfigSnapshot;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(snapshot) = ConfigSnapshot::from_json_str(input) {
            // A snapshot that loaded must serialize back
            let _ = snapshot.to_json();
        }
    }
});
