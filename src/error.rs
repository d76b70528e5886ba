use derive_more::{Display, Error, From};

use crate::config::ConfigError;
use crate::platform::PlatformError;

/// Errors returned by link-envoy operations.
///
/// Synchronous problems (bad input, failed lookups, platform setup) are returned before any
/// state is left registered. Run-time link trouble never shows up here once
/// [`Station::start`](crate::station::Station::start) has returned; it is folded into
/// [`LinkStatus`](crate::station::LinkStatus) instead.
#[derive(Debug, Display, Error, From, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub enum Error {
    /// A required input was empty or out of range.
    #[display("invalid configuration: {_0}")]
    Configuration(ConfigError),

    /// The probe target (or time server) could not be turned into an address.
    #[display("name resolution failed")]
    #[from(ignore)]
    Resolution,

    /// Interface creation, radio init or event registration failed.
    #[display("platform setup failed: {_0}")]
    PlatformSetup(PlatformError),

    /// The initial connect ended on the failed outcome after the retry budget ran out.
    #[display("link retries exhausted")]
    #[from(ignore)]
    LinkRetriesExhausted,

    /// A probe run woke on a timeout sample instead of its end-of-run report.
    #[display("probe run did not reach end-of-run")]
    #[from(ignore)]
    ProbeIncomplete,

    /// `start` was called while a session is still active. Call `stop` first.
    #[display("session already started")]
    #[from(ignore)]
    AlreadyStarted,

    /// `stop` ran while `start` was still waiting on the first connect.
    #[display("stopped before the link came up")]
    #[from(ignore)]
    Stopped,

    /// No SNTP attempt produced a usable timestamp.
    #[display("time sync failed")]
    #[from(ignore)]
    TimeSync,
}

/// Result type with [`Error`] as the default error.
pub type Result<T, E = Error> = core::result::Result<T, E>;
