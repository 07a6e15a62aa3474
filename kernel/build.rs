// =============================================================================
// C5BOOT - Kernel Build Script
// =============================================================================
// Passes the linker script and picks the entry symbol: `_handoff_start` when
// the image is started by U-Boot, `_reset` otherwise. Host builds link as an
// ordinary program.
// =============================================================================

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=link.ld");

    if env::var("CARGO_CFG_TARGET_ARCH").as_deref() != Ok("arm") {
        return;
    }

    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    println!("cargo:rustc-link-arg-bins=-T{}/link.ld", manifest_dir);

    let entry = if env::var_os("CARGO_FEATURE_EXIT_TO_UBOOT").is_some() {
        "_handoff_start"
    } else {
        "_reset"
    };
    println!("cargo:rustc-link-arg-bins=--entry={}", entry);
}
