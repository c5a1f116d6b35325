//! Radio driver capability set.
//!
//! The state machine never talks to a vendor API directly. Anything that can
//! bring the radio up, build and destroy network interfaces, scan and connect
//! implements [`RadioDriver`]: the ESP-IDF backend on hardware and
//! [`SimulatedRadio`](super::SimulatedRadio) on the host.

use super::events::EventSender;
use crate::config::NetworkProfile;
use std::fmt;

/// Operating mode requested from the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    /// Access point only.
    Ap,
    /// Station only.
    Sta,
    /// Access point with a station side available for scanning.
    ApSta,
}

/// Kind of network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    AccessPoint,
    Station,
}

/// One network seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    /// Raw SSID bytes. Hidden networks report an empty SSID.
    pub ssid: Vec<u8>,
    /// Received signal strength in dBm.
    pub rssi: i8,
}

impl ScanRecord {
    pub fn new(ssid: impl AsRef<[u8]>, rssi: i8) -> Self {
        Self {
            ssid: ssid.as_ref().to_vec(),
            rssi,
        }
    }

    /// SSID for log output. Invalid UTF-8 is replaced.
    pub fn ssid_lossy(&self) -> String {
        String::from_utf8_lossy(&self.ssid).into_owned()
    }
}

/// Radio and network stack operations used by the state machine.
///
/// Interfaces are owned values: the only way to get rid of one is to hand it
/// back through [`destroy_interface`](RadioDriver::destroy_interface).
pub trait RadioDriver {
    /// Handle to one live network interface.
    type Interface;

    /// Stable per-device identifier, used to name the fallback access point.
    fn device_id(&self) -> Option<[u8; 6]>;

    /// One-time bring-up: event loop, driver init, event forwarding.
    fn init(&mut self, events: EventSender) -> Result<(), DriverError>;

    /// Undo [`init`](RadioDriver::init).
    fn deinit(&mut self) -> Result<(), DriverError>;

    fn set_mode(&mut self, mode: RadioMode) -> Result<(), DriverError>;

    /// Apply SSID and passphrase to `interface`.
    fn configure(
        &mut self,
        interface: &Self::Interface,
        profile: &NetworkProfile,
    ) -> Result<(), DriverError>;

    fn start(&mut self) -> Result<(), DriverError>;

    /// Request association with the configured network.
    ///
    /// Blocks until the driver reports an outcome. `Ok` means the station
    /// associated; a queued request that has not resolved yet is not success.
    fn connect(&mut self) -> Result<(), DriverError>;

    fn disconnect(&mut self) -> Result<(), DriverError>;

    /// Blocking scan of visible networks, in driver order.
    fn scan(&mut self) -> Result<Vec<ScanRecord>, DriverError>;

    fn create_ap_interface(&mut self) -> Result<Self::Interface, DriverError>;

    fn create_sta_interface(&mut self) -> Result<Self::Interface, DriverError>;

    fn destroy_interface(&mut self, interface: Self::Interface);
}

/// Errors reported by a radio driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Operation needs the one-time bring-up first.
    NotInitialized,
    /// Operation needs a live interface.
    NoInterface,
    /// The driver refused the request (bad credentials, network absent).
    Rejected(String),
    /// Vendor stack error.
    Backend(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "radio not initialized"),
            Self::NoInterface => write!(f, "no network interface"),
            Self::Rejected(reason) => write!(f, "rejected: {}", reason),
            Self::Backend(msg) => write!(f, "driver error: {}", msg),
        }
    }
}

impl std::error::Error for DriverError {}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for DriverError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Backend(format!("ESP error: {:?}", e))
    }
}
