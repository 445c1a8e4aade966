#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Loading and validation must never panic on any input.
        if let Ok(program) = ravel_ir::Program::from_json(s) {
            let _ = program.validate();
        }
    }
});
