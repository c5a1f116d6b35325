//! ESP-IDF radio backend.
//!
//! Wraps [`WifiDriver`] in [`BlockingWifi`] for driver lifetime,
//! configuration, scan and connect, so `connect` returns only once the
//! association has succeeded or failed. Network interfaces are the default ESP-IDF AP and STA netifs, created and
//! destroyed through the C API so they can be torn down between modes.

use super::driver::{DriverError, InterfaceKind, RadioDriver, RadioMode, ScanRecord};
use super::events::{EventSender, RadioEvent};
use crate::config::{NetworkProfile, NetworkSettings};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
    WifiDriver,
};
use esp_idf_sys::{self as sys, esp};
use log::{debug, info, warn};
use std::ffi::{c_void, CString};
use std::net::Ipv4Addr;
use std::ptr::NonNull;

/// Live default netif created for one mode.
pub struct EspInterface {
    kind: InterfaceKind,
    netif: NonNull<sys::esp_netif_t>,
}

// The netif handle is only touched from the supervisor thread.
unsafe impl Send for EspInterface {}

/// Radio backend for ESP32 targets.
pub struct EspRadio {
    sysloop: EspSystemEventLoop,
    nvs: Option<EspDefaultNvsPartition>,
    settings: NetworkSettings,
    driver: Option<BlockingWifi<WifiDriver<'static>>>,
    handler_arg: Option<NonNull<EventSender>>,
    mode: RadioMode,
    ap: Option<AccessPointConfiguration>,
    sta: Option<ClientConfiguration>,
}

unsafe impl Send for EspRadio {}

impl EspRadio {
    pub fn new(
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        settings: NetworkSettings,
    ) -> Self {
        Self {
            sysloop,
            nvs,
            settings,
            driver: None,
            handler_arg: None,
            mode: RadioMode::ApSta,
            ap: None,
            sta: None,
        }
    }

    fn driver_mut(&mut self) -> Result<&mut BlockingWifi<WifiDriver<'static>>, DriverError> {
        self.driver.as_mut().ok_or(DriverError::NotInitialized)
    }

    fn configuration(&self) -> Result<Configuration, DriverError> {
        let ap = || self.ap.clone().ok_or(DriverError::NoInterface);
        let sta = || self.sta.clone().ok_or(DriverError::NoInterface);
        Ok(match self.mode {
            RadioMode::Ap => Configuration::AccessPoint(ap()?),
            RadioMode::Sta => Configuration::Client(sta()?),
            RadioMode::ApSta => {
                Configuration::Mixed(self.sta.clone().unwrap_or_default(), ap()?)
            }
        })
    }

    fn access_point_config(
        &self,
        profile: &NetworkProfile,
    ) -> Result<AccessPointConfiguration, DriverError> {
        Ok(AccessPointConfiguration {
            ssid: as_str(profile.ssid())?
                .try_into()
                .map_err(|_| DriverError::Rejected("SSID too long".into()))?,
            password: as_str(profile.password())?
                .try_into()
                .map_err(|_| DriverError::Rejected("password too long".into()))?,
            channel: self.settings.ap_channel,
            auth_method: auth_method(profile),
            max_connections: self.settings.ap_max_connections,
            ..Default::default()
        })
    }

    fn tune_access_point(&self) {
        let protocols = (sys::WIFI_PROTOCOL_11B | sys::WIFI_PROTOCOL_11G | sys::WIFI_PROTOCOL_11N) as u8;
        if let Err(e) = esp!(unsafe { sys::esp_wifi_set_protocol(sys::wifi_interface_t_WIFI_IF_AP, protocols) }) {
            warn!("Could not enable 802.11n on the access point: {:?}", e);
        }
        if let Err(e) = esp!(unsafe { sys::esp_wifi_set_ps(sys::wifi_ps_type_t_WIFI_PS_NONE) }) {
            warn!("Could not disable power save: {:?}", e);
        }
    }

    fn register_handlers(&mut self, events: EventSender) -> Result<(), DriverError> {
        let arg = Box::into_raw(Box::new(events));
        // SAFETY: `arg` stays valid until `unregister_handlers` frees it.
        self.handler_arg = NonNull::new(arg);
        unsafe {
            esp!(sys::esp_event_handler_register(
                sys::WIFI_EVENT,
                sys::ESP_EVENT_ANY_ID as i32,
                Some(forward_radio_event),
                arg as *mut c_void,
            ))?;
            esp!(sys::esp_event_handler_register(
                sys::IP_EVENT,
                sys::ip_event_t_IP_EVENT_STA_GOT_IP as i32,
                Some(forward_radio_event),
                arg as *mut c_void,
            ))?;
        }
        Ok(())
    }

    fn unregister_handlers(&mut self) {
        let Some(arg) = self.handler_arg.take() else {
            return;
        };
        unsafe {
            sys::esp_event_handler_unregister(
                sys::WIFI_EVENT,
                sys::ESP_EVENT_ANY_ID as i32,
                Some(forward_radio_event),
            );
            sys::esp_event_handler_unregister(
                sys::IP_EVENT,
                sys::ip_event_t_IP_EVENT_STA_GOT_IP as i32,
                Some(forward_radio_event),
            );
            // SAFETY: no handler can observe `arg` once unregistered.
            drop(Box::from_raw(arg.as_ptr()));
        }
    }
}

impl RadioDriver for EspRadio {
    type Interface = EspInterface;

    fn device_id(&self) -> Option<[u8; 6]> {
        let mut mac = [0u8; 6];
        esp!(unsafe { sys::esp_read_mac(mac.as_mut_ptr(), sys::esp_mac_type_t_ESP_MAC_WIFI_SOFTAP) })
            .ok()
            .map(|_| mac)
    }

    fn init(&mut self, events: EventSender) -> Result<(), DriverError> {
        if self.driver.is_some() {
            return Ok(());
        }
        esp!(unsafe { sys::esp_netif_init() })?;

        // SAFETY: the previous driver, if any, was dropped in `deinit`.
        let modem = unsafe { Modem::new() };
        let driver = WifiDriver::new(modem, self.sysloop.clone(), self.nvs.clone())?;
        self.driver = Some(BlockingWifi::wrap(driver, self.sysloop.clone())?);

        if let Err(e) = self.register_handlers(events) {
            self.unregister_handlers();
            self.driver = None;
            return Err(e);
        }
        info!("WiFi driver initialized");
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), DriverError> {
        self.unregister_handlers();
        let mut driver = self.driver.take().ok_or(DriverError::NotInitialized)?;
        if driver.is_started()? {
            driver.stop()?;
        }
        drop(driver);
        self.ap = None;
        self.sta = None;
        debug!("WiFi driver released");
        Ok(())
    }

    fn set_mode(&mut self, mode: RadioMode) -> Result<(), DriverError> {
        self.driver_mut()?;
        self.mode = mode;
        Ok(())
    }

    fn configure(
        &mut self,
        interface: &EspInterface,
        profile: &NetworkProfile,
    ) -> Result<(), DriverError> {
        self.driver_mut()?;
        match interface.kind {
            InterfaceKind::AccessPoint => {
                self.ap = Some(self.access_point_config(profile)?);
            }
            InterfaceKind::Station => {
                self.sta = Some(ClientConfiguration {
                    ssid: as_str(profile.ssid())?
                        .try_into()
                        .map_err(|_| DriverError::Rejected("SSID too long".into()))?,
                    password: as_str(profile.password())?
                        .try_into()
                        .map_err(|_| DriverError::Rejected("password too long".into()))?,
                    auth_method: auth_method(profile),
                    ..Default::default()
                });
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), DriverError> {
        let config = self.configuration()?;
        let mode = self.mode;
        let driver = self.driver_mut()?;
        if driver.is_started()? {
            driver.stop()?;
        }
        driver.set_configuration(&config)?;
        driver.start()?;
        if mode != RadioMode::Sta {
            self.tune_access_point();
        }
        Ok(())
    }

    fn connect(&mut self) -> Result<(), DriverError> {
        // Blocks until the station is associated, or fails on rejection or timeout
        self.driver_mut()?.connect()?;
        info!("Station associated");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        self.driver_mut()?.disconnect()?;
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<ScanRecord>, DriverError> {
        let found = self.driver_mut()?.scan()?;
        Ok(found
            .into_iter()
            .map(|ap| ScanRecord::new(ap.ssid.as_bytes(), ap.signal_strength))
            .collect())
    }

    fn create_ap_interface(&mut self) -> Result<EspInterface, DriverError> {
        self.driver_mut()?;
        let netif = NonNull::new(unsafe { sys::esp_netif_create_default_wifi_ap() })
            .ok_or_else(|| DriverError::Backend("AP netif creation failed".into()))?;
        set_router_offer(netif, self.settings.dhcps_router_offer());
        Ok(EspInterface {
            kind: InterfaceKind::AccessPoint,
            netif,
        })
    }

    fn create_sta_interface(&mut self) -> Result<EspInterface, DriverError> {
        self.driver_mut()?;
        let netif = NonNull::new(unsafe { sys::esp_netif_create_default_wifi_sta() })
            .ok_or_else(|| DriverError::Backend("STA netif creation failed".into()))?;

        if let Some(hostname) = &self.settings.hostname {
            match CString::new(hostname.as_str()) {
                Ok(name) => {
                    if let Err(e) = esp!(unsafe { sys::esp_netif_set_hostname(netif.as_ptr(), name.as_ptr()) }) {
                        warn!("Could not set hostname: {:?}", e);
                    } else {
                        info!("setting hostname:{}", hostname);
                    }
                }
                Err(_) => warn!("Hostname contains a NUL byte, not applied"),
            }
        }

        Ok(EspInterface {
            kind: InterfaceKind::Station,
            netif,
        })
    }

    fn destroy_interface(&mut self, interface: EspInterface) {
        unsafe { sys::esp_netif_destroy_default_wifi(interface.netif.as_ptr() as *mut c_void) };
        match interface.kind {
            InterfaceKind::AccessPoint => self.ap = None,
            InterfaceKind::Station => self.sta = None,
        }
    }
}

impl Drop for EspRadio {
    fn drop(&mut self) {
        self.unregister_handlers();
    }
}

/// Set the router-solicitation option of the AP's DHCP server. The server
/// must be stopped while options change.
fn set_router_offer(netif: NonNull<sys::esp_netif_t>, mut offer: u8) {
    let netif = netif.as_ptr();
    unsafe {
        if let Err(e) = esp!(sys::esp_netif_dhcps_stop(netif)) {
            // Already stopped is fine
            debug!("DHCP server stop: {:?}", e);
        }
        if let Err(e) = esp!(sys::esp_netif_dhcps_option(
            netif,
            sys::esp_netif_dhcp_option_mode_t_ESP_NETIF_OP_SET,
            sys::esp_netif_dhcp_option_id_t_ESP_NETIF_ROUTER_SOLICITATION_ADDRESS,
            &mut offer as *mut u8 as *mut c_void,
            core::mem::size_of::<u8>() as u32,
        )) {
            warn!("Could not set the AP gateway offer: {:?}", e);
        }
        if let Err(e) = esp!(sys::esp_netif_dhcps_start(netif)) {
            warn!("Could not restart the AP DHCP server: {:?}", e);
        }
    }
}

fn as_str(bytes: &[u8]) -> Result<&str, DriverError> {
    std::str::from_utf8(bytes).map_err(|_| DriverError::Rejected("not valid UTF-8".into()))
}

fn auth_method(profile: &NetworkProfile) -> AuthMethod {
    if profile.is_open() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    }
}

/// Forward WiFi and IP events from the ESP-IDF event loop to the channel.
extern "C" fn forward_radio_event(
    arg: *mut c_void,
    event_base: sys::esp_event_base_t,
    event_id: i32,
    event_data: *mut c_void,
) {
    if arg.is_null() {
        return;
    }
    // SAFETY: `arg` is the boxed sender registered in `register_handlers`,
    // and `event_data` points to the payload type matching `event_id`.
    unsafe {
        let events = &*(arg as *const EventSender);
        let event = if event_base == sys::IP_EVENT {
            if event_id != sys::ip_event_t_IP_EVENT_STA_GOT_IP as i32 || event_data.is_null() {
                return;
            }
            let got = &*(event_data as *const sys::ip_event_got_ip_t);
            RadioEvent::GotIp {
                ip: Ipv4Addr::from(got.ip_info.ip.addr.to_le_bytes()),
            }
        } else if event_base == sys::WIFI_EVENT {
            match decode_wifi_event(event_id as u32, event_data) {
                Some(event) => event,
                None => return,
            }
        } else {
            return;
        };
        events.emit(event);
    }
}

unsafe fn decode_wifi_event(id: u32, data: *mut c_void) -> Option<RadioEvent> {
    if id == sys::wifi_event_t_WIFI_EVENT_STA_START {
        return Some(RadioEvent::StationStarted);
    }
    if data.is_null() {
        return None;
    }
    match id {
        sys::wifi_event_t_WIFI_EVENT_STA_CONNECTED => {
            let e = &*(data as *const sys::wifi_event_sta_connected_t);
            let len = (e.ssid_len as usize).min(e.ssid.len());
            Some(RadioEvent::StationConnected {
                ssid: e.ssid[..len].to_vec(),
            })
        }
        sys::wifi_event_t_WIFI_EVENT_STA_DISCONNECTED => {
            let e = &*(data as *const sys::wifi_event_sta_disconnected_t);
            Some(RadioEvent::StationDisconnected {
                reason: e.reason as u16,
            })
        }
        sys::wifi_event_t_WIFI_EVENT_AP_STACONNECTED => {
            let e = &*(data as *const sys::wifi_event_ap_staconnected_t);
            Some(RadioEvent::ClientJoined {
                mac: e.mac,
                aid: e.aid,
            })
        }
        sys::wifi_event_t_WIFI_EVENT_AP_STADISCONNECTED => {
            let e = &*(data as *const sys::wifi_event_ap_stadisconnected_t);
            Some(RadioEvent::ClientLeft {
                mac: e.mac,
                aid: e.aid,
            })
        }
        _ => None,
    }
}
