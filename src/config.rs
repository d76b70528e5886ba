//! Typed configuration for the station, access point and probe, plus compile-time defaults.
//!
//! Credentials and retry settings can be baked in at build time:
//!
//! | Variable                 | Used by                                   |
//! |--------------------------|-------------------------------------------|
//! | `WIFI_STA_SSID`          | [`compiled_station_credentials`]          |
//! | `WIFI_STA_PASSWORD`      | [`compiled_station_credentials`]          |
//! | `WIFI_STA_MAXIMUM_RETRY` | [`compiled_retry_policy`]                 |
//! | `WIFI_AP_SSID`           | [`compiled_access_point_config`]          |
//! | `WIFI_AP_PASSWORD`       | [`compiled_access_point_config`]          |

use core::net::Ipv4Addr;

use derive_more::{Display, Error};
use embassy_time::Duration;
use heapless::String;

use crate::Result;

/// Longest SSID the radio accepts, in bytes.
pub const SSID_MAX: usize = 32;
/// Longest passphrase the radio accepts, in bytes.
pub const PASSWORD_MAX: usize = 64;
/// Shortest WPA/WPA2 passphrase, in bytes.
pub const WPA_PASSWORD_MIN: usize = 8;

/// Immediate reconnect attempts before a station falls back to the timed retry.
pub const DEFAULT_MAX_RETRIES: u8 = 5;
/// Delay before the timed reconnect after the retry budget is spent.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Echo requests per probe run.
pub const DEFAULT_PROBE_COUNT: u32 = 2;
/// Spacing between echo requests.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(1000);
/// Scheduling priority hint handed to the platform's echo task.
pub const DEFAULT_PROBE_PRIORITY: u8 = 2;
/// How long the platform waits for each echo reply.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1000);
/// Echo payload size, in bytes.
pub const DEFAULT_PROBE_PAYLOAD_SIZE: u32 = 64;

/// Access-point channel when none is configured.
pub const DEFAULT_AP_CHANNEL: u8 = 1;
/// Simultaneous clients an access point admits when none is configured.
pub const DEFAULT_AP_MAX_CONNECTIONS: u8 = 4;

/// Rejected configuration input.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub enum ConfigError {
    /// The SSID is empty.
    #[display("SSID is empty")]
    EmptySsid,
    /// The SSID is longer than [`SSID_MAX`] bytes.
    #[display("SSID longer than 32 bytes")]
    SsidTooLong,
    /// The password is longer than [`PASSWORD_MAX`] bytes.
    #[display("password longer than 64 bytes")]
    PasswordTooLong,
    /// A WPA password shorter than [`WPA_PASSWORD_MIN`] bytes.
    #[display("password shorter than 8 bytes")]
    PasswordTooShort,
    /// A probe was asked to send zero echo requests.
    #[display("probe count must be at least 1")]
    ZeroProbeCount,
}

// ============================================================================
// Credentials
// ============================================================================

/// Network name and passphrase, validated against the radio's limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    ssid: String<SSID_MAX>,
    password: String<PASSWORD_MAX>,
}

impl Credentials {
    /// Validate and copy an SSID/password pair.
    ///
    /// An empty password is allowed; it selects an open network.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptySsid`], [`ConfigError::SsidTooLong`] or
    /// [`ConfigError::PasswordTooLong`].
    pub fn new(ssid: &str, password: &str) -> Result<Self> {
        if ssid.is_empty() {
            return Err(ConfigError::EmptySsid.into());
        }
        let ssid = String::try_from(ssid).map_err(|()| ConfigError::SsidTooLong)?;
        let password = String::try_from(password).map_err(|()| ConfigError::PasswordTooLong)?;
        Ok(Self { ssid, password })
    }

    /// The network name.
    #[must_use]
    pub fn ssid(&self) -> &str {
        self.ssid.as_str()
    }

    /// The passphrase (empty for open networks).
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.as_str()
    }

    /// Whether this pair targets an open (unauthenticated) network.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

// ============================================================================
// Addressing
// ============================================================================

/// A fixed IPv4 configuration that replaces DHCP on an interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub struct StaticIp {
    /// Address assigned to the interface.
    pub address: Ipv4Addr,
    /// Default gateway.
    pub gateway: Ipv4Addr,
    /// Subnet mask.
    pub netmask: Ipv4Addr,
}

// ============================================================================
// Retry policy
// ============================================================================

/// How a station reacts to link loss: up to `max_retries` immediate reconnects, then a
/// single timed reconnect after `retry_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub struct RetryPolicy {
    /// Immediate reconnect attempts per outage. Zero sends every outage straight to the
    /// timed path.
    pub max_retries: u8,
    /// Delay before the timed reconnect.
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy. A zero `retry_delay` is replaced by [`DEFAULT_RETRY_DELAY`].
    #[must_use]
    pub const fn new(max_retries: u8, retry_delay: Duration) -> Self {
        let retry_delay = if retry_delay.as_ticks() == 0 {
            DEFAULT_RETRY_DELAY
        } else {
            retry_delay
        };
        Self {
            max_retries,
            retry_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

// ============================================================================
// Probe
// ============================================================================

/// Settings for one reachability probe run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub struct ProbeConfig {
    /// Echo requests to send (at least 1).
    pub count: u32,
    /// Spacing between requests.
    pub interval: Duration,
    /// Scheduling priority hint for the platform's echo task.
    pub priority: u8,
    /// Per-request reply timeout.
    pub timeout: Duration,
    /// Payload size in bytes.
    pub payload_size: u32,
    /// Wake the caller with a failure on the first timed-out request instead of waiting for
    /// the end-of-run report.
    pub abort_on_timeout: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_PROBE_COUNT,
            interval: DEFAULT_PROBE_INTERVAL,
            priority: DEFAULT_PROBE_PRIORITY,
            timeout: DEFAULT_PROBE_TIMEOUT,
            payload_size: DEFAULT_PROBE_PAYLOAD_SIZE,
            abort_on_timeout: true,
        }
    }
}

impl ProbeConfig {
    /// Same settings with a different request count.
    #[must_use]
    pub const fn with_count(self, count: u32) -> Self {
        Self { count, ..self }
    }

    /// Same settings with timeouts only recorded, never ending the run early.
    #[must_use]
    pub const fn tolerate_timeouts(self) -> Self {
        Self {
            abort_on_timeout: false,
            ..self
        }
    }
}

// ============================================================================
// Access point
// ============================================================================

/// Settings for hosting a network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApConfig {
    /// Network name and passphrase. An empty passphrase hosts an open network.
    pub credentials: Credentials,
    /// Radio channel.
    pub channel: u8,
    /// Simultaneous clients admitted.
    pub max_connections: u8,
    /// Address plan for the hosted network; `None` keeps the platform default.
    pub static_ip: Option<StaticIp>,
}

impl ApConfig {
    /// Access point with default channel and connection limit.
    ///
    /// # Errors
    ///
    /// Same as [`Credentials::new`], plus [`ConfigError::PasswordTooShort`] for a non-empty
    /// passphrase shorter than [`WPA_PASSWORD_MIN`].
    pub fn new(ssid: &str, password: &str) -> Result<Self> {
        let credentials = Credentials::new(ssid, password)?;
        if !credentials.is_open() && credentials.password().len() < WPA_PASSWORD_MIN {
            return Err(ConfigError::PasswordTooShort.into());
        }
        Ok(Self {
            credentials,
            channel: DEFAULT_AP_CHANNEL,
            max_connections: DEFAULT_AP_MAX_CONNECTIONS,
            static_ip: None,
        })
    }
}

// ============================================================================
// Compile-time defaults
// ============================================================================

/// Station credentials from `WIFI_STA_SSID` / `WIFI_STA_PASSWORD`, if set at build time
/// and valid.
#[must_use]
pub fn compiled_station_credentials() -> Option<Credentials> {
    let ssid = option_env!("WIFI_STA_SSID")?;
    let password = option_env!("WIFI_STA_PASSWORD").unwrap_or("");
    Credentials::new(ssid, password).ok()
}

/// Retry policy with `max_retries` from `WIFI_STA_MAXIMUM_RETRY` when set at build time.
#[must_use]
pub fn compiled_retry_policy() -> RetryPolicy {
    let max_retries = option_env!("WIFI_STA_MAXIMUM_RETRY")
        .and_then(|value| value.trim().parse::<u8>().ok())
        .unwrap_or(DEFAULT_MAX_RETRIES);
    RetryPolicy::new(max_retries, DEFAULT_RETRY_DELAY)
}

/// Access-point settings from `WIFI_AP_SSID` / `WIFI_AP_PASSWORD`, if set at build time and
/// valid.
#[must_use]
pub fn compiled_access_point_config() -> Option<ApConfig> {
    let ssid = option_env!("WIFI_AP_SSID")?;
    let password = option_env!("WIFI_AP_PASSWORD").unwrap_or("");
    ApConfig::new(ssid, password).ok()
}
