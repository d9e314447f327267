use std::time::Duration;

use crate::error::ConfigurationError;
use crate::helpers::url_ip_addr;

pub(crate) const DEFAULT_PSK: &str = "0000";
pub(crate) const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_BOOT_GRACE: Duration = Duration::from_secs(90);
pub(crate) const DEFAULT_MAX_ASSOCIATIONS: usize = 128;

/// Settings for a single Sony TV. Can be created with [`DeviceSettingsBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSettings {
    /// IPv4 or IPv6 address of the TV, optionally with a port.
    pub host: String,
    /// Pre-shared key configured on the TV (sent as `X-Auth-PSK`).
    pub psk: String,
    /// How often the manager polls the TV. A zero interval disables polling.
    pub update_interval: Duration,
    /// How long after a failed power-status query an "active" answer is double-checked.
    pub boot_grace: Duration,
    /// Delay before the single retry of a failed power-status query.
    pub power_status_retry_delay: Duration,
    /// Delay between switching power and re-reading the power status.
    pub power_settle_delay: Duration,
    /// Maximum number of pings sent while the TV was last seen on the network.
    pub ping_attempts: u32,
    pub ping_timeout: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Cap on association-table entries, sentinel included.
    pub max_associations: usize,
    /// Correlation id sent with every JSON-RPC request.
    pub rpc_id: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettingsBuilder::new().build()
    }
}

impl DeviceSettings {
    /// Check that the settings describe a TV that can be talked to.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::HostEmpty);
        }

        match url_ip_addr(&format!("http://{}/", self.host)) {
            Some(_) => Ok(()),
            None => Err(ConfigurationError::HostInvalid(self.host.clone())),
        }
    }
}

/// Build a [`DeviceSettings`] instance.
///
/// Examples:
/// ```
/// use std::time::Duration;
///
/// use sonytv_manager::DeviceSettingsBuilder;
///
/// // Default settings (no host yet)
/// DeviceSettingsBuilder::default();
///
/// // Settings with overrides
/// DeviceSettingsBuilder::new()
///     .with_host("192.168.1.50")
///     .with_psk("1234")
///     .with_update_interval(Duration::from_secs(30))
///     .build();
/// ```
pub struct DeviceSettingsBuilder {
    settings: DeviceSettings,
}

impl Default for DeviceSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: DeviceSettings {
                host: String::new(),
                psk: DEFAULT_PSK.to_string(),
                update_interval: DEFAULT_UPDATE_INTERVAL,
                boot_grace: DEFAULT_BOOT_GRACE,
                power_status_retry_delay: Duration::from_secs(3),
                power_settle_delay: Duration::from_secs(2),
                ping_attempts: 10,
                ping_timeout: Duration::from_secs(1),
                connect_timeout: Duration::from_secs(1),
                request_timeout: Duration::from_secs(5),
                max_associations: DEFAULT_MAX_ASSOCIATIONS,
                rpc_id: 1,
            },
        }
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.settings.host = host.trim().to_string();
        self
    }

    pub fn with_psk(mut self, psk: &str) -> Self {
        self.settings.psk = psk.to_string();
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.settings.update_interval = interval;
        self
    }

    pub fn with_boot_grace(mut self, grace: Duration) -> Self {
        self.settings.boot_grace = grace;
        self
    }

    /// Override both the power-status retry delay and the post-switch settle delay.
    pub fn with_power_delays(mut self, retry_delay: Duration, settle_delay: Duration) -> Self {
        self.settings.power_status_retry_delay = retry_delay;
        self.settings.power_settle_delay = settle_delay;
        self
    }

    pub fn with_ping(mut self, attempts: u32, timeout: Duration) -> Self {
        self.settings.ping_attempts = attempts.max(1);
        self.settings.ping_timeout = timeout;
        self
    }

    pub fn with_http_timeouts(mut self, connect_timeout: Duration, request_timeout: Duration) -> Self {
        self.settings.connect_timeout = connect_timeout;
        self.settings.request_timeout = request_timeout;
        self
    }

    pub fn with_max_associations(mut self, max_associations: usize) -> Self {
        self.settings.max_associations = max_associations.max(1);
        self
    }

    pub fn with_rpc_id(mut self, rpc_id: u64) -> Self {
        self.settings.rpc_id = rpc_id;
        self
    }

    pub fn build(self) -> DeviceSettings {
        self.settings
    }
}

// ================================================================================================
// Tests
