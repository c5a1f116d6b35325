//! Simulated radio for host builds.
//!
//! Plays back a scripted set of visible networks and decides connect
//! outcomes from a per-network "joinable" flag. Every driver call is
//! recorded so ordering can be checked.

use super::driver::{DriverError, InterfaceKind, RadioDriver, RadioMode, ScanRecord};
use super::events::{EventSender, RadioEvent};
use crate::config::NetworkProfile;
use log::debug;
use rand_core::{OsRng, RngCore};
use std::net::Ipv4Addr;

/// 802.11 reason code reported when the network is not in range.
pub const REASON_NO_AP_FOUND: u16 = 201;

/// 802.11 reason code reported when authentication fails.
pub const REASON_AUTH_FAIL: u16 = 202;

/// One driver call, as recorded by [`SimulatedRadio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Init,
    Deinit,
    SetMode(RadioMode),
    /// Interface kind and SSID applied.
    Configure(InterfaceKind, Vec<u8>),
    Start,
    Connect,
    Disconnect,
    Scan,
    CreateInterface(InterfaceKind),
    DestroyInterface(InterfaceKind),
}

/// Interface handle issued by [`SimulatedRadio`]. Not clonable.
#[derive(Debug, PartialEq, Eq)]
pub struct SimInterface {
    id: u32,
    kind: InterfaceKind,
}

impl SimInterface {
    pub fn kind(&self) -> InterfaceKind {
        self.kind
    }
}

#[derive(Debug, Clone)]
struct SimNetwork {
    record: ScanRecord,
    joinable: bool,
}

/// Host stand-in for the radio and network stack.
#[derive(Debug)]
pub struct SimulatedRadio {
    device_id: [u8; 6],
    networks: Vec<SimNetwork>,
    calls: Vec<RadioCall>,
    events: Option<EventSender>,
    initialized: bool,
    started: bool,
    mode: Option<RadioMode>,
    sta_profile: Option<NetworkProfile>,
    associated: Option<Vec<u8>>,
    live: Vec<u32>,
    next_id: u32,
    created: usize,
    fail_start: bool,
    fail_scan: bool,
}

impl SimulatedRadio {
    /// A radio with no visible networks and a fixed device identifier.
    pub fn new() -> Self {
        Self::with_device_id([0x02, 0x00, 0x00, 0x00, 0x00, 0x01])
    }

    /// A radio with a random, locally administered device identifier.
    pub fn with_random_id() -> Self {
        let mut id = [0u8; 6];
        OsRng.fill_bytes(&mut id);
        // Locally administered, unicast
        id[0] = (id[0] | 0x02) & 0xfe;
        Self::with_device_id(id)
    }

    pub fn with_device_id(device_id: [u8; 6]) -> Self {
        Self {
            device_id,
            networks: Vec::new(),
            calls: Vec::new(),
            events: None,
            initialized: false,
            started: false,
            mode: None,
            sta_profile: None,
            associated: None,
            live: Vec::new(),
            next_id: 0,
            created: 0,
            fail_start: false,
            fail_scan: false,
        }
    }

    /// Make a network visible. `joinable` decides the connect outcome.
    pub fn add_network(&mut self, ssid: impl AsRef<[u8]>, rssi: i8, joinable: bool) {
        self.networks.push(SimNetwork {
            record: ScanRecord::new(ssid, rssi),
            joinable,
        });
    }

    /// Take a network out of range.
    pub fn remove_network(&mut self, ssid: impl AsRef<[u8]>) {
        let ssid = ssid.as_ref();
        self.networks.retain(|n| n.record.ssid != ssid);
    }

    pub fn set_joinable(&mut self, ssid: impl AsRef<[u8]>, joinable: bool) {
        let ssid = ssid.as_ref();
        for network in self.networks.iter_mut().filter(|n| n.record.ssid == ssid) {
            network.joinable = joinable;
        }
    }

    pub fn fail_start(&mut self, fail: bool) {
        self.fail_start = fail;
    }

    pub fn fail_scan(&mut self, fail: bool) {
        self.fail_scan = fail;
    }

    pub fn calls(&self) -> &[RadioCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Interfaces created and not yet destroyed.
    pub fn live_interfaces(&self) -> usize {
        self.live.len()
    }

    /// Interfaces created over the radio's lifetime.
    pub fn interfaces_created(&self) -> usize {
        self.created
    }

    /// SSID of the network the station side is associated with.
    pub fn associated_ssid(&self) -> Option<&[u8]> {
        self.associated.as_deref()
    }

    pub fn radio_mode(&self) -> Option<RadioMode> {
        self.mode
    }

    fn emit(&self, event: RadioEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    fn require_init(&self) -> Result<(), DriverError> {
        if self.initialized {
            Ok(())
        } else {
            Err(DriverError::NotInitialized)
        }
    }

    fn create(&mut self, kind: InterfaceKind) -> Result<SimInterface, DriverError> {
        self.calls.push(RadioCall::CreateInterface(kind));
        self.require_init()?;
        let id = self.next_id;
        self.next_id += 1;
        self.created += 1;
        self.live.push(id);
        Ok(SimInterface { id, kind })
    }
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioDriver for SimulatedRadio {
    type Interface = SimInterface;

    fn device_id(&self) -> Option<[u8; 6]> {
        Some(self.device_id)
    }

    fn init(&mut self, events: EventSender) -> Result<(), DriverError> {
        self.calls.push(RadioCall::Init);
        self.events = Some(events);
        self.initialized = true;
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), DriverError> {
        self.calls.push(RadioCall::Deinit);
        self.require_init()?;
        self.initialized = false;
        self.started = false;
        self.mode = None;
        self.associated = None;
        self.events = None;
        Ok(())
    }

    fn set_mode(&mut self, mode: RadioMode) -> Result<(), DriverError> {
        self.calls.push(RadioCall::SetMode(mode));
        self.require_init()?;
        self.mode = Some(mode);
        Ok(())
    }

    fn configure(
        &mut self,
        interface: &SimInterface,
        profile: &NetworkProfile,
    ) -> Result<(), DriverError> {
        self.calls
            .push(RadioCall::Configure(interface.kind, profile.ssid().to_vec()));
        self.require_init()?;
        if !self.live.contains(&interface.id) {
            return Err(DriverError::NoInterface);
        }
        if interface.kind == InterfaceKind::Station {
            self.sta_profile = Some(profile.clone());
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), DriverError> {
        self.calls.push(RadioCall::Start);
        self.require_init()?;
        if self.fail_start {
            return Err(DriverError::Backend("simulated start failure".into()));
        }
        self.started = true;
        if self.mode == Some(RadioMode::Sta) {
            self.emit(RadioEvent::StationStarted);
        }
        Ok(())
    }

    fn connect(&mut self) -> Result<(), DriverError> {
        self.calls.push(RadioCall::Connect);
        self.require_init()?;
        let profile = self.sta_profile.as_ref().ok_or(DriverError::NoInterface)?;
        let ssid = profile.ssid().to_vec();

        match self.networks.iter().find(|n| n.record.ssid == ssid) {
            Some(network) if network.joinable => {
                debug!("simulated association with {}", profile.ssid_lossy());
                self.associated = Some(ssid.clone());
                self.emit(RadioEvent::StationConnected { ssid });
                self.emit(RadioEvent::GotIp {
                    ip: Ipv4Addr::new(192, 168, 1, 50),
                });
                Ok(())
            }
            Some(_) => {
                self.emit(RadioEvent::StationDisconnected {
                    reason: REASON_AUTH_FAIL,
                });
                Err(DriverError::Rejected("authentication failed".into()))
            }
            None => {
                self.emit(RadioEvent::StationDisconnected {
                    reason: REASON_NO_AP_FOUND,
                });
                Err(DriverError::Rejected("network not found".into()))
            }
        }
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        self.calls.push(RadioCall::Disconnect);
        self.require_init()?;
        if self.associated.take().is_some() {
            self.emit(RadioEvent::StationDisconnected { reason: 8 });
        }
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<ScanRecord>, DriverError> {
        self.calls.push(RadioCall::Scan);
        self.require_init()?;
        if !self.started {
            return Err(DriverError::Rejected("radio not started".into()));
        }
        if self.fail_scan {
            return Err(DriverError::Backend("simulated scan failure".into()));
        }
        Ok(self.networks.iter().map(|n| n.record.clone()).collect())
    }

    fn create_ap_interface(&mut self) -> Result<SimInterface, DriverError> {
        self.create(InterfaceKind::AccessPoint)
    }

    fn create_sta_interface(&mut self) -> Result<SimInterface, DriverError> {
        self.create(InterfaceKind::Station)
    }

    fn destroy_interface(&mut self, interface: SimInterface) {
        self.calls.push(RadioCall::DestroyInterface(interface.kind));
        self.live.retain(|&id| id != interface.id);
        if interface.kind == InterfaceKind::Station {
            self.sta_profile = None;
            self.associated = None;
        }
    }
}
