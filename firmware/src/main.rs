#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

mod settings;
mod telemetry;

#[cfg(target_os = "none")]
mod hw;
#[cfg(target_os = "none")]
mod runtime;

/// Host builds only check the baked-in settings.
#[cfg(not(target_os = "none"))]
fn main() {
    match settings::BuildOverrides::from_build_env().resolve() {
        Ok(config) => println!(
            "ssid `{}`, download {}, upload {}, restart policy {}",
            config.credentials.ssid, config.download_peer, config.upload_peer, config.restart_policy
        ),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    }
}
