//! Radio control: driver abstraction, scan matching and the mode state machine.
//!
//! # Components
//!
//! - [`driver`] - capability set every radio backend implements
//! - [`events`] - asynchronous radio events, logged by the supervisor
//! - [`matcher`] - RSSI ranking and stored-profile selection
//! - [`machine`] - Idle / AccessPoint / Station transitions
//! - [`sim`] - scripted radio for host builds and tests
//! - `esp` - ESP-IDF backend (ESP32 only)

pub mod driver;
pub mod events;
pub mod machine;
pub mod matcher;
pub mod sim;

#[cfg(feature = "esp32")]
mod esp;

pub use driver::{DriverError, InterfaceKind, RadioDriver, RadioMode, ScanRecord};
pub use events::{event_channel, EventReceiver, EventSender, RadioEvent};
pub use machine::{ConnectivityStateMachine, Mode};
pub use matcher::{match_profile, rank};
pub use sim::{RadioCall, SimInterface, SimulatedRadio};

#[cfg(feature = "esp32")]
pub use esp::{EspInterface, EspRadio};
