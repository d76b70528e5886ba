//! Station-mode link supervisor: join a network, keep the link alive across disconnects.
//!
//! A [`Station`] owns its radio driver, event registration and reconnect timer. The caller
//! awaits [`Station::start`]; the platform feeds link events into
//! [`Station::handle_event`] from its own context. Each disconnect is answered with an
//! immediate reconnect until the [`RetryPolicy`] budget is spent, after which the station
//! reports [`LinkStatus::Failed`] and schedules one timed reconnect.
//!
//! ```rust,no_run
//! use link_envoy::config::RetryPolicy;
//! use link_envoy::platform::{EventChannel, WifiDriver};
//! use link_envoy::station::{LinkStatus, ReconnectTimer, Station};
//!
//! async fn bring_up<D: WifiDriver, E: EventChannel>(
//!     station: &Station<D, E, ReconnectTimer>,
//! ) -> link_envoy::Result<()> {
//!     // Elsewhere: `station.run_reconnect_timer().await` in its own task, and the
//!     // platform's event loop calling `station.handle_event(..)`.
//!     let status = station
//!         .start("home-net", "hunter22", None, RetryPolicy::default())
//!         .await?;
//!     assert_eq!(status, LinkStatus::Connected);
//!     Ok(())
//! }
//! ```

mod reconnect_timer;

use core::cell::Cell;
use core::net::Ipv4Addr;

use derive_more::Display;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

pub use reconnect_timer::ReconnectTimer;

use crate::config::{Credentials, RetryPolicy, StaticIp};
use crate::platform::{
    AuthMode, EventChannel, EventKind, InterfaceMode, PlatformError, RadioConfig, TimerService,
    WifiDriver,
};
use crate::sync_gate::{Outcome, OutcomeSet, SyncGate};
use crate::{Error, Result};

// ============================================================================
// Status and events
// ============================================================================

/// Link state of a station.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
#[repr(u8)]
pub enum LinkStatus {
    /// Not started, or stopped.
    #[display("off")]
    Off = 0,
    /// Joining (or rejoining) the network.
    #[display("connecting")]
    Connecting = 1,
    /// Joined with a usable address.
    #[display("connected")]
    Connected = 2,
    /// Retry budget spent; waiting for the timed reconnect.
    #[display("failed")]
    Failed = 3,
}

impl LinkStatus {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Failed,
            _ => Self::Off,
        }
    }
}

/// Platform notification for a station.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub enum StationEvent {
    /// The radio came up in station mode.
    Started,
    /// The link went down (or a join attempt failed) with the driver's reason code.
    Disconnected {
        /// Driver reason code; see [`disconnect_reason_label`].
        reason: u8,
    },
    /// The interface acquired an address.
    GotIp {
        /// The acquired address.
        address: Ipv4Addr,
    },
}

/// Outcome bits a [`Station`] signals to its `start` caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub enum LinkOutcome {
    /// An address was acquired.
    Connected,
    /// The retry budget was spent.
    Failed,
    /// The session was torn down.
    Stopped,
}

impl Outcome for LinkOutcome {
    fn bit(self) -> u32 {
        match self {
            Self::Connected => 1 << 0,
            Self::Failed => 1 << 1,
            Self::Stopped => 1 << 2,
        }
    }
}

/// Short name for a radio disconnect reason code.
#[must_use]
pub const fn disconnect_reason_label(reason: u8) -> &'static str {
    match reason {
        1 => "unspecified",
        2 => "auth_expire",
        3 => "auth_leave",
        4 => "assoc_expire",
        5 => "assoc_toomany",
        8 => "assoc_leave",
        15 => "4way_handshake_timeout",
        200 => "beacon_timeout",
        201 => "no_ap_found",
        202 => "auth_fail",
        203 => "assoc_fail",
        204 => "handshake_timeout",
        205 => "connection_fail",
        210 => "no_ap_found_compatible_security",
        211 => "no_ap_found_authmode_threshold",
        212 => "no_ap_found_rssi_threshold",
        _ => "other",
    }
}

// ============================================================================
// Station
// ============================================================================

/// Station-mode supervisor. One instance per station interface.
pub struct Station<D, E, T> {
    driver: D,
    events: E,
    timer: T,
    status: AtomicU8,
    retries: AtomicU8,
    policy: Mutex<CriticalSectionRawMutex, Cell<RetryPolicy>>,
    /// A session exists (between a successful-or-pending `start` and `stop`).
    active: AtomicBool,
    /// Events are being accepted.
    registered: AtomicBool,
    gate: SyncGate<LinkOutcome>,
}

impl<D, E, T> Station<D, E, T>
where
    D: WifiDriver,
    E: EventChannel,
    T: TimerService,
{
    /// A stopped station over the given collaborators.
    #[must_use]
    pub const fn new(driver: D, events: E, timer: T) -> Self {
        Self {
            driver,
            events,
            timer,
            status: AtomicU8::new(LinkStatus::Off as u8),
            retries: AtomicU8::new(0),
            policy: Mutex::new(Cell::new(RetryPolicy::new(
                crate::config::DEFAULT_MAX_RETRIES,
                crate::config::DEFAULT_RETRY_DELAY,
            ))),
            active: AtomicBool::new(false),
            registered: AtomicBool::new(false),
            gate: SyncGate::new(),
        }
    }

    /// Join `ssid` and wait until the link is up or the retry budget is spent.
    ///
    /// An empty `password` joins an open network. With `static_ip`, DHCP is disabled and the
    /// fixed address applied before the radio starts.
    ///
    /// On [`Error::LinkRetriesExhausted`] the session stays registered with the reconnect
    /// timer armed, so the station keeps trying in the background until [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyStarted`] if a session is active;
    /// * [`Error::Configuration`] for bad credentials, before any platform call;
    /// * [`Error::PlatformSetup`] if interface creation, radio setup or event registration
    ///   fails (nothing is left registered);
    /// * [`Error::LinkRetriesExhausted`] if the first connect ends in
    ///   [`LinkStatus::Failed`];
    /// * [`Error::Stopped`] if [`stop`](Self::stop) runs before the first connect settles.
    pub async fn start(
        &self,
        ssid: &str,
        password: &str,
        static_ip: Option<StaticIp>,
        policy: RetryPolicy,
    ) -> Result<LinkStatus> {
        if self.active.swap(true, Ordering::AcqRel) {
            warn!("Station: start while a session is active");
            return Err(Error::AlreadyStarted);
        }

        if let Err(err) = self.bring_up(ssid, password, static_ip, policy) {
            self.active.store(false, Ordering::Release);
            return Err(err);
        }

        let seen = self
            .gate
            .wait(
                OutcomeSet::of(&[
                    LinkOutcome::Connected,
                    LinkOutcome::Failed,
                    LinkOutcome::Stopped,
                ]),
                true,
            )
            .await;

        if seen.contains(LinkOutcome::Stopped) {
            warn!("Station: stopped while joining {}", ssid);
            Err(Error::Stopped)
        } else if seen.contains(LinkOutcome::Connected) {
            info!("Station: connected to {}", ssid);
            Ok(LinkStatus::Connected)
        } else {
            warn!("Station: failed to connect to {}", ssid);
            Err(Error::LinkRetriesExhausted)
        }
    }

    fn bring_up(
        &self,
        ssid: &str,
        password: &str,
        static_ip: Option<StaticIp>,
        policy: RetryPolicy,
    ) -> Result<()> {
        let credentials = Credentials::new(ssid, password)?;

        self.driver.init(InterfaceMode::Station)?;

        if let Some(static_ip) = static_ip {
            if let Err(err) = self.driver.set_static_ip(InterfaceMode::Station, &static_ip) {
                error!("Station: static address rejected: {}", err);
                self.release_driver();
                return Err(err.into());
            }
            info!("Station: static address {}", static_ip.address);
        }

        self.policy.lock(|cell| cell.set(policy));
        self.retries.store(0, Ordering::Release);
        self.set_status(LinkStatus::Connecting);
        self.gate.clear();

        self.registered.store(true, Ordering::Release);
        if let Err(err) = self.register_events() {
            error!("Station: event registration failed: {}", err);
            self.registered.store(false, Ordering::Release);
            self.set_status(LinkStatus::Off);
            self.release_driver();
            return Err(err.into());
        }

        let auth_threshold = if credentials.is_open() {
            AuthMode::Open
        } else {
            AuthMode::Wpa2Personal
        };
        let radio = RadioConfig::Station {
            credentials,
            auth_threshold,
            pmf_capable: true,
            pmf_required: false,
        };
        if let Err(err) = self.driver.configure(&radio).and_then(|()| self.driver.start()) {
            error!("Station: radio start failed: {}", err);
            self.registered.store(false, Ordering::Release);
            self.unregister_events();
            self.set_status(LinkStatus::Off);
            self.release_driver();
            return Err(err.into());
        }

        info!(
            "Station: started, joining {} (max retries {})",
            ssid, policy.max_retries
        );
        Ok(())
    }

    /// Feed one platform event into the state machine. Never blocks.
    ///
    /// Events that arrive while no session is registered are ignored.
    pub fn handle_event(&self, event: StationEvent) {
        if !self.registered.load(Ordering::Acquire) {
            debug!("Station: event ignored, not registered");
            return;
        }

        match event {
            StationEvent::Started => self.request_connect(),
            StationEvent::Disconnected { reason } => self.on_disconnected(reason),
            StationEvent::GotIp { address } => {
                self.retries.store(0, Ordering::Release);
                self.set_status(LinkStatus::Connected);
                self.timer.cancel();
                info!("Station: got ip {}", address);
                self.gate.signal(LinkOutcome::Connected);
            }
        }
    }

    fn on_disconnected(&self, reason: u8) {
        let policy = self.retry_policy();
        let attempts = self.retries.load(Ordering::Acquire);

        if attempts < policy.max_retries {
            let attempt = attempts.saturating_add(1);
            self.retries.store(attempt, Ordering::Release);
            self.set_status(LinkStatus::Connecting);
            info!(
                "Station: link down ({} {}), retry {}/{}",
                reason,
                disconnect_reason_label(reason),
                attempt,
                policy.max_retries
            );
            self.request_connect();
            return;
        }

        self.retries.store(0, Ordering::Release);
        self.set_status(LinkStatus::Failed);
        warn!(
            "Station: link down ({} {}), retries exhausted; reconnecting in {} s",
            reason,
            disconnect_reason_label(reason),
            policy.retry_delay.as_secs()
        );
        self.timer.arm(policy.retry_delay);
        self.gate.signal(LinkOutcome::Failed);
    }

    /// Timed reconnect. Only acts while the station is still [`LinkStatus::Failed`].
    pub fn on_reconnect_timer(&self) {
        if !self.registered.load(Ordering::Acquire) {
            return;
        }
        if self.status() != LinkStatus::Failed {
            debug!("Station: reconnect timer fired in state {}", self.status());
            return;
        }

        self.retries.store(0, Ordering::Release);
        self.set_status(LinkStatus::Connecting);
        info!("Station: timed reconnect");
        self.request_connect();
    }

    /// Tear the session down: cancel the timer, unregister events, stop and release the
    /// radio. Does nothing when no session is active.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }

        self.timer.cancel();
        self.registered.store(false, Ordering::Release);
        self.unregister_events();
        self.release_driver();

        self.set_status(LinkStatus::Off);
        self.retries.store(0, Ordering::Release);
        // Wakes a `start` still waiting on the first connect.
        self.gate.signal(LinkOutcome::Stopped);
        info!("Station: stopped");
    }

    /// Current link state.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        LinkStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Immediate reconnects used in the current outage.
    #[must_use]
    pub fn retry_count(&self) -> u8 {
        self.retries.load(Ordering::Acquire)
    }

    /// Policy of the current (or most recent) session.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy.lock(Cell::get)
    }

    /// The radio driver.
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// The reconnect timer.
    pub const fn timer(&self) -> &T {
        &self.timer
    }

    fn set_status(&self, status: LinkStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    fn request_connect(&self) {
        if let Err(err) = self.driver.connect() {
            warn!("Station: connect request failed: {}", err);
        }
    }

    fn register_events(&self) -> core::result::Result<(), PlatformError> {
        self.events.register(EventKind::Wifi)?;
        if let Err(err) = self.events.register(EventKind::StationGotIp) {
            if let Err(undo) = self.events.unregister(EventKind::Wifi) {
                warn!("Station: unregister after failed registration: {}", undo);
            }
            return Err(err);
        }
        Ok(())
    }

    fn unregister_events(&self) {
        for kind in [EventKind::StationGotIp, EventKind::Wifi] {
            if let Err(err) = self.events.unregister(kind) {
                warn!("Station: unregister {} failed: {}", kind as u8, err);
            }
        }
    }

    fn release_driver(&self) {
        match self.driver.stop() {
            Ok(()) => {}
            Err(PlatformError::NotInitialized) => return,
            Err(err) => warn!("Station: radio stop failed: {}", err),
        }
        if let Err(err) = self.driver.deinit() {
            warn!("Station: radio deinit failed: {}", err);
        }
    }
}

impl<D, E> Station<D, E, ReconnectTimer>
where
    D: WifiDriver,
    E: EventChannel,
{
    /// Drive the bundled [`ReconnectTimer`]. Run this in its own task for the station's
    /// lifetime.
    pub async fn run_reconnect_timer(&self) -> ! {
        self.timer.run(|| self.on_reconnect_timer()).await
    }
}
