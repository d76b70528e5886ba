//! SNTP client over the platform's datagram service.

use core::net::IpAddr;

use embassy_time::{Duration, Timer};
use time::OffsetDateTime;

use crate::platform::{NetStack, preferred_address};
use crate::{Error, Result};

/// UDP port of an NTP server.
pub const NTP_PORT: u16 = 123;
/// Size of an SNTP packet without extensions.
pub const SNTP_PACKET_LEN: usize = 48;
/// Seconds from 1900-01-01 (NTP era 0) to 1970-01-01.
const NTP_TO_UNIX_OFFSET: i64 = 2_208_988_800;

/// Seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub struct UnixSeconds(pub i64);

impl UnixSeconds {
    /// Convert an NTP era-0 seconds count.
    #[must_use]
    pub fn from_ntp_seconds(ntp_seconds: u32) -> Self {
        Self(i64::from(ntp_seconds).saturating_sub(NTP_TO_UNIX_OFFSET))
    }

    /// As a UTC date-time, or `None` if out of range.
    #[must_use]
    pub fn to_offset_date_time(self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.0).ok()
    }
}

/// Why a server reply was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub enum SntpReject {
    /// Shorter than [`SNTP_PACKET_LEN`].
    Truncated,
    /// Mode is neither server (4) nor broadcast (5).
    NotServer,
    /// Stratum 0: the server told us to go away.
    KissOfDeath,
    /// The transmit timestamp is zero.
    NoTimestamp,
}

/// Retry settings for [`sync_time`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub struct SntpConfig {
    /// Exchanges to try before giving up.
    pub attempts: u8,
    /// How long to wait for each reply.
    pub timeout: Duration,
    /// Pause between failed attempts.
    pub retry_delay: Duration,
}

impl Default for SntpConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// A client request: LI=0, VN=3, Mode=3.
#[must_use]
pub const fn sntp_request() -> [u8; SNTP_PACKET_LEN] {
    let mut request = [0u8; SNTP_PACKET_LEN];
    request[0] = 0x1B;
    request
}

/// Read the transmit timestamp out of a server reply.
///
/// # Errors
///
/// See [`SntpReject`].
pub fn parse_sntp_response(response: &[u8]) -> core::result::Result<UnixSeconds, SntpReject> {
    let Some(packet) = response.first_chunk::<SNTP_PACKET_LEN>() else {
        return Err(SntpReject::Truncated);
    };
    let mode = packet[0] & 0x07;
    if mode != 4 && mode != 5 {
        return Err(SntpReject::NotServer);
    }
    if packet[1] == 0 {
        return Err(SntpReject::KissOfDeath);
    }
    // Transmit timestamp, seconds part.
    let ntp_seconds = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]);
    if ntp_seconds == 0 {
        return Err(SntpReject::NoTimestamp);
    }
    Ok(UnixSeconds::from_ntp_seconds(ntp_seconds))
}

/// Ask `server` for the current time.
///
/// # Errors
///
/// [`Error::Resolution`] when the server name does not resolve, [`Error::TimeSync`] when no
/// attempt produced a usable reply.
pub async fn sync_time<N: NetStack>(
    net: &N,
    server: &str,
    config: &SntpConfig,
) -> Result<UnixSeconds> {
    let address = match server.parse::<IpAddr>() {
        Ok(address) => address,
        Err(_) => {
            let addresses = net.resolve(server).await.map_err(|err| {
                warn!("TimeSync: lookup of {} failed: {}", server, err);
                Error::Resolution
            })?;
            preferred_address(&addresses).ok_or(Error::Resolution)?
        }
    };

    let request = sntp_request();
    for attempt in 1..=config.attempts {
        let mut response = [0u8; SNTP_PACKET_LEN];
        match net
            .udp_exchange(address, NTP_PORT, &request, &mut response, config.timeout)
            .await
        {
            Ok(len) => match parse_sntp_response(response.get(..len).unwrap_or_default()) {
                Ok(unix_seconds) => {
                    info!("TimeSync: {} says {}", server, unix_seconds.0);
                    return Ok(unix_seconds);
                }
                Err(reject) => {
                    warn!(
                        "TimeSync: attempt {} rejected ({})",
                        attempt,
                        reject_label(reject)
                    );
                }
            },
            Err(err) => warn!("TimeSync: attempt {} failed: {}", attempt, err),
        }

        if attempt < config.attempts {
            Timer::after(config.retry_delay).await;
        }
    }

    error!("TimeSync: no usable reply from {}", server);
    Err(Error::TimeSync)
}

const fn reject_label(reject: SntpReject) -> &'static str {
    match reject {
        SntpReject::Truncated => "truncated",
        SntpReject::NotServer => "not a server reply",
        SntpReject::KissOfDeath => "kiss-of-death",
        SntpReject::NoTimestamp => "no timestamp",
    }
}
