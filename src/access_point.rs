//! Access-point mode: host a network and log clients as they come and go.

use portable_atomic::{AtomicBool, Ordering};

use crate::config::ApConfig;
use crate::platform::{
    AuthMode, EventChannel, EventKind, InterfaceMode, MacAddress, PlatformError, RadioConfig,
    WifiDriver,
};
use crate::{Error, Result};

/// Client notification for an access point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApEvent {
    /// A client associated.
    StationJoined {
        /// Client MAC.
        mac: MacAddress,
        /// Association id.
        aid: u16,
    },
    /// A client left.
    StationLeft {
        /// Client MAC.
        mac: MacAddress,
        /// Association id.
        aid: u16,
    },
}

/// Access-point supervisor.
pub struct AccessPoint<D, E> {
    driver: D,
    events: E,
    active: AtomicBool,
    registered: AtomicBool,
}

impl<D: WifiDriver, E: EventChannel> AccessPoint<D, E> {
    /// A stopped access point over the given collaborators.
    #[must_use]
    pub const fn new(driver: D, events: E) -> Self {
        Self {
            driver,
            events,
            active: AtomicBool::new(false),
            registered: AtomicBool::new(false),
        }
    }

    /// Bring the access point up.
    ///
    /// An empty passphrase hosts an open network; otherwise WPA/WPA2 personal is used.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] when already up, [`Error::PlatformSetup`] when any platform
    /// step fails (everything done so far is undone).
    pub fn start(&self, config: &ApConfig) -> Result<()> {
        if self.active.swap(true, Ordering::AcqRel) {
            warn!("AccessPoint: start while already up");
            return Err(Error::AlreadyStarted);
        }

        if let Err(err) = self.bring_up(config) {
            error!("AccessPoint: start failed: {}", err);
            self.active.store(false, Ordering::Release);
            return Err(err.into());
        }

        info!(
            "AccessPoint: up, SSID {} channel {} max clients {}",
            config.credentials.ssid(),
            config.channel,
            config.max_connections
        );
        Ok(())
    }

    fn bring_up(&self, config: &ApConfig) -> core::result::Result<(), PlatformError> {
        self.driver.init(InterfaceMode::AccessPoint)?;

        let result = self.configure_and_start(config);
        if result.is_err() {
            self.release();
        }
        result
    }

    fn configure_and_start(&self, config: &ApConfig) -> core::result::Result<(), PlatformError> {
        if let Some(static_ip) = &config.static_ip {
            self.driver
                .set_static_ip(InterfaceMode::AccessPoint, static_ip)?;
            info!("AccessPoint: address {}", static_ip.address);
        }

        self.events.register(EventKind::Wifi)?;
        self.registered.store(true, Ordering::Release);

        let auth_mode = if config.credentials.is_open() {
            AuthMode::Open
        } else {
            AuthMode::WpaWpa2Personal
        };
        self.driver.configure(&RadioConfig::AccessPoint {
            credentials: config.credentials.clone(),
            auth_mode,
            channel: config.channel,
            max_connections: config.max_connections,
        })?;
        self.driver.start()
    }

    /// Log a client joining or leaving. No accounting is kept.
    pub fn handle_event(&self, event: ApEvent) {
        if !self.registered.load(Ordering::Acquire) {
            return;
        }
        match event {
            ApEvent::StationJoined { mac, aid } => {
                info!("AccessPoint: station {} join, AID={}", mac, aid);
            }
            ApEvent::StationLeft { mac, aid } => {
                info!("AccessPoint: station {} leave, AID={}", mac, aid);
            }
        }
    }

    /// Whether the access point is up.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Take the access point down. Does nothing when it is not up.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        self.release();
        info!("AccessPoint: stopped");
    }

    fn release(&self) {
        if self.registered.swap(false, Ordering::AcqRel) {
            if let Err(err) = self.events.unregister(EventKind::Wifi) {
                warn!("AccessPoint: unregister failed: {}", err);
            }
        }
        match self.driver.stop() {
            Ok(()) => {}
            Err(PlatformError::NotInitialized) => return,
            Err(err) => warn!("AccessPoint: radio stop failed: {}", err),
        }
        if let Err(err) = self.driver.deinit() {
            warn!("AccessPoint: radio deinit failed: {}", err);
        }
    }
}
