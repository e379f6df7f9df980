#![no_main]

use idveil::interception::HookCatalog;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Any input must yield a catalog or an error, never a panic
        if let Ok(catalog) = HookCatalog::from_toml_str(input) {
            for site in catalog.sites() {
                let _ = site.validate();
            }
        }
    }
});
