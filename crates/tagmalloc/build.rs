fn main() {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();

    // Only the C entry points leave the shared object; everything else stays
    // local so the dynamic linker binds malloc and friends to us.
    if target_os == "linux" && std::env::var_os("CARGO_FEATURE_C_ABI").is_some() {
        let script = format!("{}/linker/version_script.lds", manifest_dir);
        println!(
            "cargo:rustc-cdylib-link-arg=-Wl,--version-script={}",
            script
        );
    }
    println!("cargo:rerun-if-changed=linker/version_script.lds");
}
