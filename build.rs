fn main() {
    // Network credentials and the optional config override are baked in at
    // build time via `option_env!`.
    println!("cargo:rerun-if-env-changed=WLAN_SSID");
    println!("cargo:rerun-if-env-changed=WLAN_PASS");
    println!("cargo:rerun-if-env-changed=NODE_CONFIG");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
