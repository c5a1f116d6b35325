//! WiFi connectivity core for the Black Magic Debug ESP32 firmware.
//!
//! Keeps the device reachable over WiFi: it joins the strongest visible
//! network with a stored profile and falls back to broadcasting its own
//! access point when none can be joined.
//!
//! Everything except the ESP-IDF radio and NVS backends builds and tests on
//! the host machine; those sit behind the `esp32` feature.

pub mod config;
pub mod store;
pub mod supervisor;
pub mod wifi;

// Re-export commonly used items
pub use config::{ConfigError, DeviceNetworkConfig, MaskPolicy, NetworkProfile, NetworkSettings};
pub use store::{ConfigStore, KeyValueStore, StoreError};
pub use supervisor::{spawn_supervisor, ConnectivityHandle, CycleReport, Supervisor, SupervisorError};
pub use wifi::{ConnectivityStateMachine, DriverError, Mode, RadioDriver, RadioEvent, ScanRecord};
