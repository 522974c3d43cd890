fn main() {
    // esp-hal linker script; only the firmware binaries are linked for the target
    println!("cargo:rustc-link-arg-bins=-Tlinkall.x");
}
