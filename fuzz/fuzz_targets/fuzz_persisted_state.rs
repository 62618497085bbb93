#![no_main]
use desiccator_core::persist::{decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Any accepted calibration file must survive a re-encode unchanged.
    if let Ok(cells) = decode(data) {
        let text = encode(&cells);
        let again = decode(&text).expect("re-encoded state must decode");
        assert_eq!(again, cells);
    }
});
