// =============================================================================
// C5BOOT - ARMv7-A Build Script
// =============================================================================
// Assembles the reset and handoff entry stubs and links them with Rust.
// Host builds (unit tests, dry runs) have no use for them and skip this step.
// =============================================================================

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/boot.S");

    if env::var("CARGO_CFG_TARGET_ARCH").as_deref() != Ok("arm") {
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let arch_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());

    let mut build = cc::Build::new();
    build
        .compiler("clang")
        .file(arch_dir.join("src/boot.S"))
        .flag("-c")
        .flag("-target")
        .flag("armv7a-none-eabihf")
        .flag("-mcpu=cortex-a9");

    // Image base branches to _handoff_start instead of holding the vectors
    if env::var_os("CARGO_FEATURE_HANDOFF_ENTRY").is_some() {
        build.define("HANDOFF_ENTRY", None);
    }

    build.compile("boot");

    println!("cargo:rustc-link-search=native={}", out_dir.display());
    println!("cargo:rustc-link-lib=static=boot");
}
