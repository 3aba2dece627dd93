//! Benchmark configuration.

use core::{fmt, time::Duration};

use crate::{
    cursor::RestartPolicy,
    network::{
        AssociationPolicy, CredentialsError, Endpoint, WifiCredentials,
        probe::TRANSFER_BUDGET,
    },
    sequence::{STATE_COUNT, StateStep, state_table},
    trigger::DEFAULT_PULSE_WIDTH,
};

/// How long dwell, compute and timed-sleep states last.
pub const DEFAULT_DWELL: Duration = Duration::from_millis(3_000);
/// Character-generator peer the download probe reads from.
pub const DEFAULT_DOWNLOAD_PEER: Endpoint = Endpoint::new([192, 168, 0, 10], 19);
/// Discard peer the upload probe writes to.
pub const DEFAULT_UPLOAD_PEER: Endpoint = Endpoint::new([192, 168, 0, 10], 9);

/// Tunables of one benchmark deployment.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BenchConfig<'a> {
    pub dwell: Duration,
    pub pulse_width: Duration,
    pub transfer_budget: usize,
    pub download_peer: Endpoint,
    pub upload_peer: Endpoint,
    pub credentials: WifiCredentials<'a>,
    pub association: AssociationPolicy,
    pub restart_policy: RestartPolicy,
}

impl<'a> BenchConfig<'a> {
    pub const fn new(credentials: WifiCredentials<'a>) -> Self {
        Self {
            dwell: DEFAULT_DWELL,
            pulse_width: DEFAULT_PULSE_WIDTH,
            transfer_budget: TRANSFER_BUDGET,
            download_peer: DEFAULT_DOWNLOAD_PEER,
            upload_peer: DEFAULT_UPLOAD_PEER,
            credentials,
            association: AssociationPolicy::Unbounded,
            restart_policy: RestartPolicy::HoldCursor,
        }
    }

    #[must_use]
    pub const fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    #[must_use]
    pub const fn with_pulse_width(mut self, width: Duration) -> Self {
        self.pulse_width = width;
        self
    }

    #[must_use]
    pub const fn with_transfer_budget(mut self, bytes: usize) -> Self {
        self.transfer_budget = bytes;
        self
    }

    #[must_use]
    pub const fn with_download_peer(mut self, peer: Endpoint) -> Self {
        self.download_peer = peer;
        self
    }

    #[must_use]
    pub const fn with_upload_peer(mut self, peer: Endpoint) -> Self {
        self.upload_peer = peer;
        self
    }

    #[must_use]
    pub const fn with_association(mut self, policy: AssociationPolicy) -> Self {
        self.association = policy;
        self
    }

    #[must_use]
    pub const fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// State table resolved against [`Self::dwell`].
    pub fn state_table(&self) -> [StateStep; STATE_COUNT] {
        state_table(self.dwell)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer_budget == 0 {
            return Err(ConfigError::EmptyTransferBudget);
        }
        if self.pulse_width.is_zero() {
            return Err(ConfigError::ZeroPulseWidth);
        }
        self.credentials
            .validate()
            .map_err(ConfigError::Credentials)
    }
}

impl Default for BenchConfig<'_> {
    fn default() -> Self {
        Self::new(WifiCredentials::new("SSID", "PASSWORD"))
    }
}

/// Rejected configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    EmptyTransferBudget,
    ZeroPulseWidth,
    Credentials(CredentialsError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyTransferBudget => f.write_str("transfer budget must be non-zero"),
            ConfigError::ZeroPulseWidth => f.write_str("trigger pulse width must be non-zero"),
            ConfigError::Credentials(error) => write!(f, "credentials: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{PowerState, StateAction};

    #[test]
    fn defaults_mirror_bench_constants() {
        let config = BenchConfig::default();
        assert_eq!(config.dwell, Duration::from_millis(3_000));
        assert_eq!(config.pulse_width, Duration::from_millis(50));
        assert_eq!(config.transfer_budget, 1_000_000);
        assert_eq!(config.download_peer.port, 19);
        assert_eq!(config.upload_peer.port, 9);
        assert_eq!(config.restart_policy, RestartPolicy::HoldCursor);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let config = BenchConfig::default().with_transfer_budget(0);
        assert_eq!(config.validate(), Err(ConfigError::EmptyTransferBudget));

        let config = BenchConfig::new(WifiCredentials::new("", ""));
        assert_eq!(
            config.validate(),
            Err(ConfigError::Credentials(CredentialsError::SsidLength))
        );
    }

    #[test]
    fn table_follows_configured_dwell() {
        let config = BenchConfig::default().with_dwell(Duration::from_millis(10));
        let table = config.state_table();
        assert_eq!(
            table[PowerState::Computation.as_index()].action,
            StateAction::Compute(Duration::from_millis(10))
        );
    }
}
