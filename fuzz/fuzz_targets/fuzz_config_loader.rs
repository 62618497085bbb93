#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // TOML parsing and validation of Config must reject invalid input without panicking.
    if let Ok(cfg) = toml::from_str::<desiccator_config::Config>(data) {
        let _ = cfg.validate();
    }
});
