//! Connectivity state machine.
//!
//! Owns the radio driver and the single live network interface, and moves
//! the radio between [`Mode::Idle`], [`Mode::AccessPoint`] and
//! [`Mode::Station`].
//!
//! Every transition destroys the current interface before building the next
//! one, so there is never more than one live interface. Leaving a non-idle
//! mode disconnects first; leaving `Idle` performs the one-time radio
//! bring-up first. A failed join tears everything down and lands in `Idle`.

use super::driver::{DriverError, InterfaceKind, RadioDriver, RadioMode, ScanRecord};
use super::events::EventSender;
use super::matcher::rank;
use crate::config::NetworkProfile;
use log::{debug, info, warn};
use std::fmt;

/// Current radio mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Radio not brought up, no interface.
    #[default]
    Idle,
    /// Broadcasting the fallback access point.
    AccessPoint,
    /// Joined to a client network.
    Station,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AccessPoint => write!(f, "access point"),
            Self::Station => write!(f, "station"),
        }
    }
}

/// Radio mode state machine over a [`RadioDriver`].
pub struct ConnectivityStateMachine<D: RadioDriver> {
    driver: D,
    events: EventSender,
    mode: Mode,
    interface: Option<D::Interface>,
    initialized: bool,
}

impl<D: RadioDriver> ConnectivityStateMachine<D> {
    /// Wrap `driver`. Starts in [`Mode::Idle`]; `events` is handed to the
    /// driver at bring-up.
    pub fn new(driver: D, events: EventSender) -> Self {
        Self {
            driver,
            events,
            mode: Mode::Idle,
            interface: None,
            initialized: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether a network interface is currently live.
    pub fn has_interface(&self) -> bool {
        self.interface.is_some()
    }

    /// Whether the one-time radio bring-up has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Broadcast `profile` as an access point.
    ///
    /// No-op when already in access point mode. An empty passphrase gives an
    /// open network. On failure the machine is returned to `Idle`.
    pub fn start_access_point(&mut self, profile: &NetworkProfile) -> Result<(), DriverError> {
        if self.mode == Mode::AccessPoint {
            return Ok(());
        }

        match self.try_start_access_point(profile) {
            Ok(()) => {
                self.transition(Mode::AccessPoint);
                info!(
                    "Access point up: {} ({})",
                    profile.ssid_lossy(),
                    if profile.is_open() { "open" } else { "WPA2" }
                );
                Ok(())
            }
            Err(e) => {
                warn!("Failed to start access point: {}", e);
                self.reset_to_idle();
                Err(e)
            }
        }
    }

    fn try_start_access_point(&mut self, profile: &NetworkProfile) -> Result<(), DriverError> {
        self.leave_current_mode()?;
        self.replace_interface(InterfaceKind::AccessPoint)?;
        self.driver.set_mode(RadioMode::ApSta)?;
        let interface = self.interface.as_ref().ok_or(DriverError::NoInterface)?;
        self.driver.configure(interface, profile)?;
        self.driver.start()
    }

    /// Join the client network described by `profile`.
    ///
    /// Returns `true` immediately when already in station mode, without
    /// checking which network is joined. The connect call's return code is
    /// the only success signal; on failure the interface is destroyed, the
    /// radio torn down and the machine left in `Idle`.
    pub fn join_network(&mut self, profile: &NetworkProfile) -> bool {
        if self.mode == Mode::Station {
            return true;
        }

        info!("Joining {}", profile.ssid_lossy());
        match self.try_join(profile) {
            Ok(()) => {
                self.transition(Mode::Station);
                true
            }
            Err(e) => {
                warn!("Failed to join {}: {}", profile.ssid_lossy(), e);
                self.reset_to_idle();
                false
            }
        }
    }

    fn try_join(&mut self, profile: &NetworkProfile) -> Result<(), DriverError> {
        self.leave_current_mode()?;
        self.replace_interface(InterfaceKind::Station)?;
        self.driver.set_mode(RadioMode::Sta)?;
        let interface = self.interface.as_ref().ok_or(DriverError::NoInterface)?;
        self.driver.configure(interface, profile)?;
        self.driver.start()?;
        self.driver.connect()
    }

    /// Scan for networks, strongest first.
    ///
    /// Needs the radio brought up, i.e. any mode but `Idle`.
    pub fn scan(&mut self) -> Result<Vec<ScanRecord>, DriverError> {
        if !self.initialized {
            return Err(DriverError::NotInitialized);
        }
        let mut results = self.driver.scan()?;
        rank(&mut results);
        debug!("Scan found {} networks", results.len());
        Ok(results)
    }

    /// Disconnect when leaving a live mode; bring the radio up when leaving
    /// `Idle`. Exactly one of the two applies.
    fn leave_current_mode(&mut self) -> Result<(), DriverError> {
        match self.mode {
            Mode::Idle => self.bring_up(),
            Mode::AccessPoint | Mode::Station => {
                if let Err(e) = self.driver.disconnect() {
                    debug!("Disconnect before mode change failed: {}", e);
                }
                Ok(())
            }
        }
    }

    fn bring_up(&mut self) -> Result<(), DriverError> {
        if self.initialized {
            return Ok(());
        }
        self.driver.init(self.events.clone())?;
        self.initialized = true;
        debug!("Radio brought up");
        Ok(())
    }

    /// Destroy the live interface, then create a fresh one of `kind`.
    fn replace_interface(&mut self, kind: InterfaceKind) -> Result<(), DriverError> {
        if let Some(old) = self.interface.take() {
            self.driver.destroy_interface(old);
        }
        let fresh = match kind {
            InterfaceKind::AccessPoint => self.driver.create_ap_interface()?,
            InterfaceKind::Station => self.driver.create_sta_interface()?,
        };
        self.interface = Some(fresh);
        Ok(())
    }

    /// Destroy the interface, undo bring-up and enter `Idle`.
    fn reset_to_idle(&mut self) {
        if let Some(old) = self.interface.take() {
            self.driver.destroy_interface(old);
        }
        if self.initialized {
            if let Err(e) = self.driver.deinit() {
                warn!("Radio teardown failed: {}", e);
            }
            self.initialized = false;
        }
        self.transition(Mode::Idle);
    }

    fn transition(&mut self, to: Mode) {
        if self.mode != to {
            info!("Mode {} -> {}", self.mode, to);
            self.mode = to;
        }
    }
}
