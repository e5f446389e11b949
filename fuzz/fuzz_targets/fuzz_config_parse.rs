#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Parsing arbitrary TOML must never panic.
        if let Ok(config) = toml::from_str::<shellchat::Config>(s) {
            let _ = config.validate();
        }
    }
});
