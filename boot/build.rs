//! Board images link the C storage and UART drivers. Point
//! `UBIBOOT_BACKENDS` at their directory; every `.c` and `.S` file in it is
//! built into one static library, and `target.ld` there, if present, is
//! used as the linker script.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=UBIBOOT_BACKENDS");
    if env::var_os("CARGO_FEATURE_BOARD").is_none() {
        return;
    }
    let Some(dir) = env::var_os("UBIBOOT_BACKENDS").map(PathBuf::from) else {
        println!("cargo:warning=UBIBOOT_BACKENDS not set, C backends must be linked by hand");
        return;
    };

    let mut sources: Vec<PathBuf> = fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", dir.display()))
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| matches!(p.extension().and_then(|x| x.to_str()), Some("c" | "S")))
        .collect();
    sources.sort();

    for src in &sources {
        println!("cargo:rerun-if-changed={}", src.display());
    }

    cc::Build::new()
        .files(&sources)
        .include(&dir)
        .flag_if_supported("-mno-abicalls")
        .flag_if_supported("-fno-pic")
        .flag_if_supported("-ffreestanding")
        .compile("ubiboot_backends");

    let script = dir.join("target.ld");
    if script.exists() {
        println!("cargo:rerun-if-changed={}", script.display());
        println!("cargo:rustc-link-arg-bins=-T{}", script.display());
    }
}
