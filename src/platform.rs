//! The call boundary to the platform: radio driver, event dispatcher, timers, network stack
//! and echo (ping) service.
//!
//! link-envoy never talks to hardware directly. A board support layer implements these
//! traits and forwards platform notifications into
//! [`Station::handle_event`](crate::station::Station::handle_event),
//! [`AccessPoint::handle_event`](crate::access_point::AccessPoint::handle_event) and the
//! [`EchoSink`] handed to [`EchoDriver::run_session`].

use core::fmt;
use core::net::{IpAddr, Ipv4Addr};

use derive_more::{Display, Error};
use embassy_time::Duration;
use heapless::Vec;

use crate::config::{Credentials, StaticIp};

/// Most addresses a single name lookup reports.
pub const MAX_RESOLVED_ADDRESSES: usize = 4;

/// The first IPv4 answer of a lookup, else its first answer.
#[must_use]
pub fn preferred_address(addresses: &[IpAddr]) -> Option<IpAddr> {
    addresses
        .iter()
        .find(|address| address.is_ipv4())
        .or_else(|| addresses.first())
        .copied()
}

/// Failure reported by a platform call.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub enum PlatformError {
    /// The driver was never initialized (or is already torn down).
    #[display("driver not initialized")]
    NotInitialized,
    /// The network interface could not be created.
    #[display("interface creation failed")]
    InterfaceCreation,
    /// The radio could not be initialized.
    #[display("radio init failed")]
    RadioInit,
    /// The event dispatcher refused a registration.
    #[display("event registration failed")]
    EventRegistration,
    /// A name lookup failed.
    #[display("lookup failed")]
    Lookup,
    /// A datagram could not be sent or received.
    #[display("datagram i/o failed")]
    Io,
    /// A request did not complete in time.
    #[display("timed out")]
    Timeout,
    /// Any other driver status code.
    #[display("driver error {_0}")]
    Code(#[error(not(source))] i32),
}

// ============================================================================
// Radio
// ============================================================================

/// Which interface a driver call targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub enum InterfaceMode {
    /// Client joining an existing network.
    Station,
    /// Hosting a network for other devices.
    AccessPoint,
}

/// Authentication used (AP) or required at minimum (station).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub enum AuthMode {
    /// No authentication.
    Open,
    /// WPA2 personal.
    Wpa2Personal,
    /// WPA or WPA2 personal.
    WpaWpa2Personal,
}

/// Radio configuration applied before the radio starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RadioConfig {
    /// Join a network.
    Station {
        /// Target network.
        credentials: Credentials,
        /// Weakest authentication the station accepts.
        auth_threshold: AuthMode,
        /// Advertise protected management frames.
        pmf_capable: bool,
        /// Refuse networks without protected management frames.
        pmf_required: bool,
    },
    /// Host a network.
    AccessPoint {
        /// Hosted network.
        credentials: Credentials,
        /// Authentication offered to clients.
        auth_mode: AuthMode,
        /// Radio channel.
        channel: u8,
        /// Simultaneous clients admitted.
        max_connections: u8,
    },
}

/// Radio driver requests. Every method is a synchronous request; outcomes of `start` and
/// `connect` arrive later as events.
pub trait WifiDriver {
    /// Create the network interface for `mode` and initialize the radio.
    ///
    /// # Errors
    ///
    /// [`PlatformError::InterfaceCreation`] or [`PlatformError::RadioInit`].
    fn init(&self, mode: InterfaceMode) -> Result<(), PlatformError>;

    /// Apply a fixed address. On a station this stops the DHCP client; on an access point
    /// the DHCP server is restarted around the change.
    ///
    /// # Errors
    ///
    /// Driver-specific.
    fn set_static_ip(&self, mode: InterfaceMode, static_ip: &StaticIp)
    -> Result<(), PlatformError>;

    /// Apply the radio configuration.
    ///
    /// # Errors
    ///
    /// Driver-specific.
    fn configure(&self, config: &RadioConfig) -> Result<(), PlatformError>;

    /// Start the radio. A station reports
    /// [`StationEvent::Started`](crate::station::StationEvent::Started) once up.
    ///
    /// # Errors
    ///
    /// Driver-specific.
    fn start(&self) -> Result<(), PlatformError>;

    /// Ask a started station to (re)join its network.
    ///
    /// # Errors
    ///
    /// Driver-specific.
    fn connect(&self) -> Result<(), PlatformError>;

    /// Stop the radio.
    ///
    /// # Errors
    ///
    /// [`PlatformError::NotInitialized`] when there is nothing to stop.
    fn stop(&self) -> Result<(), PlatformError>;

    /// Release the radio and destroy the interface.
    ///
    /// # Errors
    ///
    /// Driver-specific.
    fn deinit(&self) -> Result<(), PlatformError>;
}

// ============================================================================
// Events
// ============================================================================

/// Event families a supervisor subscribes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub enum EventKind {
    /// Every radio event (start, connect, disconnect, AP client join/leave).
    Wifi,
    /// The station interface acquired an address.
    StationGotIp,
}

/// Registration with the platform's event dispatcher.
///
/// After `unregister` returns, the dispatcher must not deliver that kind again.
pub trait EventChannel {
    /// Start delivering `kind`.
    ///
    /// # Errors
    ///
    /// [`PlatformError::EventRegistration`].
    fn register(&self, kind: EventKind) -> Result<(), PlatformError>;

    /// Stop delivering `kind`.
    ///
    /// # Errors
    ///
    /// Driver-specific.
    fn unregister(&self, kind: EventKind) -> Result<(), PlatformError>;
}

/// One-shot, cancelable delay. Expiry is delivered by whoever owns the timer's run loop
/// (see [`ReconnectTimer`](crate::station::ReconnectTimer)).
pub trait TimerService {
    /// Arm (or re-arm) the timer. At most one delay is outstanding.
    fn arm(&self, delay: Duration);

    /// Cancel the outstanding delay, if any. Once this returns, the pending expiry does not
    /// fire.
    fn cancel(&self);
}

// ============================================================================
// Network stack
// ============================================================================

/// Name resolution, routing info and datagram exchange.
pub trait NetStack {
    /// Resolve `host` to its addresses.
    ///
    /// # Errors
    ///
    /// [`PlatformError::Lookup`] when the lookup fails.
    async fn resolve(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr, MAX_RESOLVED_ADDRESSES>, PlatformError>;

    /// Default gateway of the station interface, if it has an address.
    fn default_gateway(&self) -> Option<Ipv4Addr>;

    /// Send `request` to `server:port` and wait up to `timeout` for one reply datagram.
    /// Returns the reply length.
    ///
    /// # Errors
    ///
    /// [`PlatformError::Timeout`] or driver-specific.
    async fn udp_exchange(
        &self,
        server: IpAddr,
        port: u16,
        request: &[u8],
        response: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, PlatformError>;
}

// ============================================================================
// Echo service
// ============================================================================

/// Everything the platform needs to run one echo session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub struct EchoConfig {
    /// Resolved target.
    pub target: IpAddr,
    /// Requests to send.
    pub count: u32,
    /// Spacing between requests.
    pub interval: Duration,
    /// Per-request reply timeout.
    pub timeout: Duration,
    /// Payload size in bytes.
    pub payload_size: u32,
    /// Priority hint for the platform's echo task.
    pub priority: u8,
}

/// One reply or timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub struct ProbeSample {
    /// Echo sequence number.
    pub sequence: u16,
    /// Round trip, absent on timeout.
    pub round_trip: Option<Duration>,
    /// Reply TTL, absent on timeout.
    pub ttl: Option<u8>,
    /// Address the reply came from (or the target, on timeout).
    pub source: IpAddr,
    /// Reply size in bytes (0 on timeout).
    pub size: u32,
}

/// Totals the platform reports when a session ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub struct EchoReport {
    /// Requests sent.
    pub transmitted: u32,
    /// Replies received.
    pub received: u32,
    /// Wall time of the whole session.
    pub duration: Duration,
}

/// Receiver for echo callbacks. Called from the platform's context; implementations only do
/// bookkeeping and never block.
pub trait EchoSink {
    /// A reply arrived.
    fn on_reply(&self, sample: ProbeSample);
    /// A request timed out.
    fn on_timeout(&self, sample: ProbeSample);
    /// The session is finished; the platform handle is released after this returns.
    fn on_end(&self, report: EchoReport);
}

/// Echo (ping) service.
pub trait EchoDriver {
    /// Run one session to completion, reporting every reply, timeout and the end of the run
    /// to `sink`. Dropping the returned future cancels the session and releases its handle.
    ///
    /// # Errors
    ///
    /// Session creation failures.
    async fn run_session(&self, config: &EchoConfig, sink: &dyn EchoSink)
    -> Result<(), PlatformError>;
}

// ============================================================================
// Borrowed collaborators
// ============================================================================

impl<T: WifiDriver + ?Sized> WifiDriver for &T {
    fn init(&self, mode: InterfaceMode) -> Result<(), PlatformError> {
        (**self).init(mode)
    }

    fn set_static_ip(
        &self,
        mode: InterfaceMode,
        static_ip: &StaticIp,
    ) -> Result<(), PlatformError> {
        (**self).set_static_ip(mode, static_ip)
    }

    fn configure(&self, config: &RadioConfig) -> Result<(), PlatformError> {
        (**self).configure(config)
    }

    fn start(&self) -> Result<(), PlatformError> {
        (**self).start()
    }

    fn connect(&self) -> Result<(), PlatformError> {
        (**self).connect()
    }

    fn stop(&self) -> Result<(), PlatformError> {
        (**self).stop()
    }

    fn deinit(&self) -> Result<(), PlatformError> {
        (**self).deinit()
    }
}

impl<T: EventChannel + ?Sized> EventChannel for &T {
    fn register(&self, kind: EventKind) -> Result<(), PlatformError> {
        (**self).register(kind)
    }

    fn unregister(&self, kind: EventKind) -> Result<(), PlatformError> {
        (**self).unregister(kind)
    }
}

impl<T: TimerService + ?Sized> TimerService for &T {
    fn arm(&self, delay: Duration) {
        (**self).arm(delay);
    }

    fn cancel(&self) {
        (**self).cancel();
    }
}

impl<T: NetStack + ?Sized> NetStack for &T {
    async fn resolve(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr, MAX_RESOLVED_ADDRESSES>, PlatformError> {
        (**self).resolve(host).await
    }

    fn default_gateway(&self) -> Option<Ipv4Addr> {
        (**self).default_gateway()
    }

    async fn udp_exchange(
        &self,
        server: IpAddr,
        port: u16,
        request: &[u8],
        response: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, PlatformError> {
        (**self)
            .udp_exchange(server, port, request, response, timeout)
            .await
    }
}

impl<T: EchoDriver + ?Sized> EchoDriver for &T {
    async fn run_session(
        &self,
        config: &EchoConfig,
        sink: &dyn EchoSink,
    ) -> Result<(), PlatformError> {
        (**self).run_session(config, sink).await
    }
}

/// A MAC address, printed as `aa:bb:cc:dd:ee:ff`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[cfg(log_defmt)]
impl defmt::Format for MacAddress {
    fn format(&self, f: defmt::Formatter<'_>) {
        let [a, b, c, d, e, g] = self.0;
        defmt::write!(
            f,
            "{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}",
            a,
            b,
            c,
            d,
            e,
            g
        );
    }
}
