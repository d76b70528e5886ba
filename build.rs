//! Build script for link-envoy.

use std::env;

fn main() {
    println!("cargo:rustc-check-cfg=cfg(rust_analyzer)");
    println!("cargo:rustc-check-cfg=cfg(log_defmt)");

    // defmt needs a target-side global logger; host builds (tests, simulations) route through `log`.
    let defmt = env::var_os("CARGO_FEATURE_DEFMT").is_some();
    let host = env::var_os("CARGO_FEATURE_HOST").is_some();
    if defmt && !host {
        println!("cargo:rustc-cfg=log_defmt");
    }
}
