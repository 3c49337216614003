// ABOUTME: Build script for embedding the backend URL at compile time
// ABOUTME: Captures CALVISION_BACKEND_URL so release builds can ship a default endpoint

fn main() {
    // Runtime environment still takes precedence over the embedded value
    if let Ok(url) = std::env::var("CALVISION_BACKEND_URL") {
        println!("cargo:rustc-env=CALVISION_BACKEND_URL={}", url);
    }

    println!("cargo:rerun-if-env-changed=CALVISION_BACKEND_URL");
}
