use std::path::Path;

fn main() {
    let crate_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    println!(
        "cargo:rustc-link-arg-bins=--script={}",
        crate_dir.join("link.ld").display(),
    );
    println!("cargo:rerun-if-changed=link.ld");
}
