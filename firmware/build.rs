use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=BENCH_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=BENCH_WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=BENCH_DOWNLOAD_PEER");
    println!("cargo:rerun-if-env-changed=BENCH_UPLOAD_PEER");
    println!("cargo:rerun-if-env-changed=BENCH_RESTART_POLICY");
    println!("cargo:rerun-if-env-changed=BENCH_ASSOCIATION_TIMEOUT_MS");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        println!("cargo:rustc-link-arg=-Tlinkall.x");
        println!("cargo:rustc-link-arg=-Tdefmt.x");
    }
}
