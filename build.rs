use std::path::Path;

const LOCAL_ORT_DIR: &str = "onnxruntime-linux-x64-1.22.0";

fn main() {
    println!("cargo:rerun-if-changed={}/", LOCAL_ORT_DIR);

    // Solo con el modelo ONNX activado y un runtime local descomprimido en la raíz
    if std::env::var_os("CARGO_FEATURE_ONNX").is_none() {
        return;
    }
    let lib_dir = Path::new(LOCAL_ORT_DIR).join("lib");
    if lib_dir.is_dir() {
        println!("cargo:rustc-link-search=native={}", lib_dir.display());
        println!("cargo:rustc-link-lib=dylib=onnxruntime");
    }
}
