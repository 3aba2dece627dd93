//! Build-time overrides for the benchmark configuration.
//!
//! The bench has no console input, so deployment details are baked in when
//! the image is compiled:
//!
//! | Variable | Example |
//! |---|---|
//! | `BENCH_WIFI_SSID` | `lab-ap` |
//! | `BENCH_WIFI_PASSWORD` | `hunter22` |
//! | `BENCH_DOWNLOAD_PEER` | `192.168.0.10:19` |
//! | `BENCH_UPLOAD_PEER` | `192.168.0.10:9` |
//! | `BENCH_RESTART_POLICY` | `hold` or `wrap` |
//! | `BENCH_ASSOCIATION_TIMEOUT_MS` | `15000` |
//!
//! Anything left unset keeps the [`BenchConfig`] default.

use core::{fmt, time::Duration};

use controller_core::{
    BenchConfig, RestartPolicy,
    config::ConfigError,
    cursor::UnknownRestartPolicy,
    network::{AssociationPolicy, Endpoint, EndpointParseError, WifiCredentials},
};

/// Raw override strings as captured at compile time.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BuildOverrides {
    pub ssid: Option<&'static str>,
    pub password: Option<&'static str>,
    pub download_peer: Option<&'static str>,
    pub upload_peer: Option<&'static str>,
    pub restart_policy: Option<&'static str>,
    pub association_timeout_ms: Option<&'static str>,
}

impl BuildOverrides {
    pub const fn from_build_env() -> Self {
        Self {
            ssid: option_env!("BENCH_WIFI_SSID"),
            password: option_env!("BENCH_WIFI_PASSWORD"),
            download_peer: option_env!("BENCH_DOWNLOAD_PEER"),
            upload_peer: option_env!("BENCH_UPLOAD_PEER"),
            restart_policy: option_env!("BENCH_RESTART_POLICY"),
            association_timeout_ms: option_env!("BENCH_ASSOCIATION_TIMEOUT_MS"),
        }
    }

    /// Applies the overrides on top of the defaults and validates the result.
    pub fn resolve(&self) -> Result<BenchConfig<'static>, SettingsError> {
        let defaults = BenchConfig::default();
        let credentials = WifiCredentials::new(
            self.ssid.unwrap_or(defaults.credentials.ssid),
            self.password.unwrap_or(defaults.credentials.password),
        );

        let mut config = BenchConfig::new(credentials);

        if let Some(peer) = self.download_peer {
            let peer = parse_peer(peer).map_err(SettingsError::DownloadPeer)?;
            config = config.with_download_peer(peer);
        }
        if let Some(peer) = self.upload_peer {
            let peer = parse_peer(peer).map_err(SettingsError::UploadPeer)?;
            config = config.with_upload_peer(peer);
        }
        if let Some(policy) = self.restart_policy {
            let policy = policy
                .parse::<RestartPolicy>()
                .map_err(SettingsError::RestartPolicy)?;
            config = config.with_restart_policy(policy);
        }
        if let Some(timeout) = self.association_timeout_ms {
            config = config.with_association(parse_association(timeout)?);
        }

        config.validate().map_err(SettingsError::Config)?;
        Ok(config)
    }
}

fn parse_peer(value: &str) -> Result<Endpoint, EndpointParseError> {
    value.parse()
}

/// `0` means wait forever, matching the default.
fn parse_association(value: &str) -> Result<AssociationPolicy, SettingsError> {
    let millis: u64 = value
        .trim()
        .parse()
        .map_err(|_| SettingsError::AssociationTimeout)?;
    Ok(match millis {
        0 => AssociationPolicy::Unbounded,
        millis => AssociationPolicy::Timeout(Duration::from_millis(millis)),
    })
}

/// Override that could not be applied.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SettingsError {
    DownloadPeer(EndpointParseError),
    UploadPeer(EndpointParseError),
    RestartPolicy(UnknownRestartPolicy),
    AssociationTimeout,
    Config(ConfigError),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::DownloadPeer(error) => write!(f, "BENCH_DOWNLOAD_PEER: {error}"),
            SettingsError::UploadPeer(error) => write!(f, "BENCH_UPLOAD_PEER: {error}"),
            SettingsError::RestartPolicy(error) => write!(f, "BENCH_RESTART_POLICY: {error}"),
            SettingsError::AssociationTimeout => {
                f.write_str("BENCH_ASSOCIATION_TIMEOUT_MS: expected milliseconds")
            }
            SettingsError::Config(error) => write!(f, "{error}"),
        }
    }
}
