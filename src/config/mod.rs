//! Device network configuration.
//!
//! # Components
//!
//! - [`profile`] - SSID/password pairs with their fixed-size storage fields
//! - [`record`] - the persisted configuration record and its byte layout
//! - [`settings`] - compile-time defaults and supervisor tuning

mod profile;
mod record;
mod settings;

pub use profile::{ConfigError, NetworkProfile, MAX_PASSWORD_LEN, MAX_SSID_LEN, MIN_PASSWORD_LEN};
pub use record::{DeviceNetworkConfig, CONFIG_MAGIC, RECORD_LEN, SLOT_LEN, STATION_SLOTS};
pub use settings::{
    MaskPolicy, NetworkSettings, DEFAULT_AP_CHANNEL, DEFAULT_AP_MAX_CONNECTIONS,
    DEFAULT_AP_PASSWORD, DEFAULT_AP_SSID, DEFAULT_SCAN_INTERVAL,
};
