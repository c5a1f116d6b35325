//! Asynchronous radio events.
//!
//! Drivers report association, address and client changes from their own
//! dispatch context. Events travel over an unbounded channel and are only
//! logged: mode transitions are driven by the synchronous connect result.

use log::{error, info};
use std::fmt;
use std::net::Ipv4Addr;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Notification from the radio or network stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    StationStarted,
    /// Associated with an access point.
    StationConnected { ssid: Vec<u8> },
    /// Lost or failed association. `reason` is the 802.11 reason code.
    StationDisconnected { reason: u16 },
    /// DHCP assigned an address to the station interface.
    GotIp { ip: Ipv4Addr },
    /// A client joined our access point.
    ClientJoined { mac: [u8; 6], aid: u8 },
    /// A client left our access point.
    ClientLeft { mac: [u8; 6], aid: u8 },
}

impl RadioEvent {
    /// Write the event to the log at a level matching its severity.
    pub fn log(&self) {
        match self {
            Self::StationDisconnected { .. } => error!("{}", self),
            _ => info!("{}", self),
        }
    }
}

impl fmt::Display for RadioEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StationStarted => write!(f, "station started"),
            Self::StationConnected { ssid } => {
                write!(f, "connected:{}", String::from_utf8_lossy(ssid))
            }
            Self::StationDisconnected { reason } => write!(f, "disconnect reason: {}", reason),
            Self::GotIp { ip } => write!(f, "associated IP address: {}", ip),
            Self::ClientJoined { mac, aid } => {
                write!(f, "station:{} join, AID={}", MacAddr(mac), aid)
            }
            Self::ClientLeft { mac, aid } => {
                write!(f, "station:{} leave, AID={}", MacAddr(mac), aid)
            }
        }
    }
}

struct MacAddr<'a>(&'a [u8; 6]);

impl fmt::Display for MacAddr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Sending half, handed to the driver at bring-up.
#[derive(Debug, Clone)]
pub struct EventSender(UnboundedSender<RadioEvent>);

impl EventSender {
    /// Queue an event. Dropped silently once the receiver is gone.
    pub fn emit(&self, event: RadioEvent) {
        let _ = self.0.send(event);
    }
}

/// Receiving half, owned by the supervisor.
#[derive(Debug)]
pub struct EventReceiver(UnboundedReceiver<RadioEvent>);

impl EventReceiver {
    /// Take every event queued so far without blocking.
    pub fn drain(&mut self) -> Vec<RadioEvent> {
        let mut events = Vec::new();
        loop {
            match self.0.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Drain the queue into the log. Returns the number of events logged.
    pub fn drain_and_log(&mut self) -> usize {
        let events = self.drain();
        for event in &events {
            event.log();
        }
        events.len()
    }
}

/// Create a connected sender/receiver pair.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender(tx), EventReceiver(rx))
}
