#![no_main]

use cgpevo::persistence::{load_environment, load_function, load_islands, load_population};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Every loader must reject malformed input with an error, never a panic
    if let Ok(f) = load_function(data) {
        let _ = f.node_count();
    }
    let _ = load_population(data);
    let _ = load_environment(data);
    let _ = load_islands(data);
});
