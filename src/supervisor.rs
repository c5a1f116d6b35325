//! Connectivity supervisor.
//!
//! One long-running task owns the configuration, the store and the state
//! machine. Each cycle:
//!
//! 1. persists the configuration if it has unsaved changes,
//! 2. brings up the fallback access point when the radio is idle,
//! 3. scans and ranks visible networks,
//! 4. picks the strongest network with a stored profile,
//! 5. joins it.
//!
//! Then it sleeps for the scan interval and starts over. A failed join lands
//! in `Idle`, so the next cycle re-broadcasts the access point and the one
//! after retries the join.

use crate::config::{DeviceNetworkConfig, NetworkProfile, NetworkSettings};
use crate::store::{ConfigStore, KeyValueStore, StoreError};
use crate::wifi::{
    event_channel, match_profile, ConnectivityStateMachine, DriverError, EventReceiver, Mode,
    RadioDriver,
};
use log::{debug, error, info, warn};
use std::fmt;
use std::thread::{self, JoinHandle};

/// Name of the supervisor thread.
pub const SUPERVISOR_THREAD_NAME: &str = "wifi manager";

/// Stack size of the supervisor thread.
pub const SUPERVISOR_STACK_SIZE: usize = 8192;

/// Process-wide connectivity state: configuration, store and radio.
pub struct ConnectivityHandle<D: RadioDriver, S> {
    config: DeviceNetworkConfig,
    store: ConfigStore<S>,
    machine: ConnectivityStateMachine<D>,
}

impl<D: RadioDriver, S: KeyValueStore> ConnectivityHandle<D, S> {
    pub fn mode(&self) -> Mode {
        self.machine.mode()
    }

    pub fn config(&self) -> &DeviceNetworkConfig {
        &self.config
    }

    /// Whether the configuration differs from what is stored.
    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    pub fn has_interface(&self) -> bool {
        self.machine.has_interface()
    }

    pub fn machine(&self) -> &ConnectivityStateMachine<D> {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut ConnectivityStateMachine<D> {
        &mut self.machine
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore<S> {
        &mut self.store
    }

    /// Write the configuration if it has unsaved changes.
    pub fn persist(&mut self) -> Result<(), StoreError> {
        self.store.save(&self.config)
    }
}

/// What one supervisor cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Mode at the end of the cycle.
    pub mode: Mode,
    /// The access point could not be started; scan and join were skipped.
    pub skipped: bool,
    /// Networks seen by the scan.
    pub scanned: usize,
    /// SSID of the stored profile chosen for joining.
    pub matched: Option<Vec<u8>>,
    /// Outcome of the join, when one was attempted.
    pub joined: Option<bool>,
    /// Radio events drained and logged at the end of the cycle.
    pub events: usize,
}

/// Drives the connectivity cycle.
pub struct Supervisor<D: RadioDriver, S> {
    settings: NetworkSettings,
    handle: ConnectivityHandle<D, S>,
    events: EventReceiver,
}

impl<D: RadioDriver, S: KeyValueStore> Supervisor<D, S> {
    /// Load the configuration from `store` and take ownership of `driver`.
    ///
    /// Defaults are generated from `settings` and the driver's device
    /// identifier when nothing valid is stored.
    pub fn new(settings: NetworkSettings, driver: D, store: S) -> Self {
        let mut store = ConfigStore::new(store);
        let device_id = driver.device_id();
        let config = store.load(|| settings.default_config(device_id));

        let (tx, events) = event_channel();
        let machine = ConnectivityStateMachine::new(driver, tx);

        Self {
            settings,
            handle: ConnectivityHandle {
                config,
                store,
                machine,
            },
            events,
        }
    }

    pub fn handle(&self) -> &ConnectivityHandle<D, S> {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut ConnectivityHandle<D, S> {
        &mut self.handle
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Run one cycle without the trailing sleep.
    pub fn run_cycle(&mut self) -> Result<CycleReport, SupervisorError> {
        let result = self.cycle();
        let logged = self.events.drain_and_log();
        result.map(|report| CycleReport {
            events: logged,
            ..report
        })
    }

    fn cycle(&mut self) -> Result<CycleReport, SupervisorError> {
        self.handle.persist()?;

        let mut report = CycleReport {
            mode: self.handle.mode(),
            skipped: false,
            scanned: 0,
            matched: None,
            joined: None,
            events: 0,
        };

        if self.handle.mode() == Mode::Idle {
            let ap = self.handle.config.ap_profile.clone();
            if let Err(e) = self.handle.machine.start_access_point(&ap) {
                error!("Access point unavailable, retrying next cycle: {}", e);
                report.mode = self.handle.mode();
                report.skipped = true;
                return Ok(report);
            }
        }

        let results = self.handle.machine.scan()?;
        report.scanned = results.len();
        debug!(
            "Visible: {}",
            results
                .iter()
                .map(|r| format!("{}({})", r.ssid_lossy(), r.rssi))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let chosen: Option<NetworkProfile> = match_profile(
            &results,
            &self.handle.config.sta_profiles,
            self.handle.config.sta_mask,
            self.settings.mask_policy,
        )
        .cloned();

        if let Some(profile) = chosen {
            debug!("Matched stored profile {}", profile.ssid_lossy());
            report.matched = Some(profile.ssid().to_vec());
            let joined = self.handle.machine.join_network(&profile);
            if !joined {
                warn!("Join failed, falling back to access point next cycle");
            }
            report.joined = Some(joined);
        }

        report.mode = self.handle.mode();
        Ok(report)
    }

    /// Run cycles forever, sleeping the scan interval between them.
    ///
    /// Returns only on a fatal error.
    pub fn run(mut self) -> SupervisorError {
        info!(
            "Supervisor running, {} s between cycles",
            self.settings.scan_interval.as_secs()
        );
        loop {
            if let Err(e) = self.run_cycle() {
                error!("Supervisor stopped: {}", e);
                return e;
            }
            thread::sleep(self.settings.scan_interval);
        }
    }
}

/// Start `supervisor` on its own named thread.
pub fn spawn_supervisor<D, S>(
    supervisor: Supervisor<D, S>,
) -> std::io::Result<JoinHandle<SupervisorError>>
where
    D: RadioDriver + Send + 'static,
    D::Interface: Send + 'static,
    S: KeyValueStore + Send + 'static,
{
    thread::Builder::new()
        .name(SUPERVISOR_THREAD_NAME.to_string())
        .stack_size(SUPERVISOR_STACK_SIZE)
        .spawn(move || supervisor.run())
}

/// Fatal supervisor errors.
#[derive(Debug)]
pub enum SupervisorError {
    /// The configuration could not be written.
    Persist(StoreError),
    /// The radio failed to scan.
    Scan(DriverError),
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persist(e) => write!(f, "failed to persist configuration: {}", e),
            Self::Scan(e) => write!(f, "scan failed: {}", e),
        }
    }
}

impl std::error::Error for SupervisorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Persist(e) => Some(e),
            Self::Scan(e) => Some(e),
        }
    }
}

impl From<StoreError> for SupervisorError {
    fn from(e: StoreError) -> Self {
        Self::Persist(e)
    }
}

impl From<DriverError> for SupervisorError {
    fn from(e: DriverError) -> Self {
        Self::Scan(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaskPolicy;
    use crate::store::{MemoryStore, CONFIG_KEY};
    use crate::wifi::SimulatedRadio;

    fn supervisor(radio: SimulatedRadio) -> Supervisor<SimulatedRadio, MemoryStore> {
        Supervisor::new(NetworkSettings::default(), radio, MemoryStore::new())
    }

    fn ap_profile() -> NetworkProfile {
        NetworkProfile::new("blackmagic", "helloworld").unwrap()
    }

    fn profile(ssid: &str) -> NetworkProfile {
        NetworkProfile::new(ssid, format!("{}-secret", ssid)).unwrap()
    }

    /// Store holding a record with `ssids` in consecutive station slots.
    fn store_with(ssids: &[&str]) -> MemoryStore {
        let mut config = DeviceNetworkConfig::new(ap_profile());
        for (slot, ssid) in ssids.iter().enumerate() {
            config.set_station(slot, profile(ssid)).unwrap();
        }
        store_holding(&config)
    }

    fn store_holding(config: &DeviceNetworkConfig) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.put(CONFIG_KEY, &config.to_bytes()).unwrap();
        store
    }

    fn radio_mut(
        supervisor: &mut Supervisor<SimulatedRadio, MemoryStore>,
    ) -> &mut SimulatedRadio {
        supervisor.handle_mut().machine_mut().driver_mut()
    }

    // ==================== Start-up Tests ====================

    #[test]
    fn test_new_loads_defaults_named_after_device() {
        let radio = SimulatedRadio::with_device_id([0x24, 0x0a, 0xc4, 0x00, 0x00, 0x01]);
        let settings = NetworkSettings {
            ap_ssid: "bmp".into(),
            append_device_id: true,
            ..NetworkSettings::default()
        };
        let supervisor = Supervisor::new(settings, radio, MemoryStore::new());

        assert_eq!(
            supervisor.handle().config().ap_profile.ssid(),
            b"bmp-240ac4000001"
        );
        assert!(supervisor.handle().is_dirty());
        assert_eq!(supervisor.handle().mode(), Mode::Idle);
        assert!(!supervisor.handle().has_interface());
    }

    #[test]
    fn test_new_uses_stored_record_unchanged() {
        let store = store_with(&["home"]);
        let expected = store.get(CONFIG_KEY).unwrap();
        let supervisor = Supervisor::new(NetworkSettings::default(), SimulatedRadio::new(), store);

        assert!(!supervisor.handle().is_dirty());
        assert_eq!(supervisor.handle().config().to_bytes(), expected);
    }

    #[test]
    fn test_saved_defaults_reload_byte_exact() {
        let mut first = supervisor(SimulatedRadio::new());
        first.run_cycle().unwrap();
        let saved = first.handle().config().clone();

        let store = first.handle().store().store().clone();
        let second = Supervisor::new(NetworkSettings::default(), SimulatedRadio::new(), store);
        assert!(!second.handle().is_dirty());
        assert_eq!(second.handle().config(), &saved);
        assert_eq!(second.handle().config().to_bytes(), saved.to_bytes());
    }

    // ==================== Cycle Tests ====================

    #[test]
    fn test_first_cycle_saves_and_starts_access_point() {
        let mut supervisor = supervisor(SimulatedRadio::new());
        let report = supervisor.run_cycle().unwrap();

        assert_eq!(report.mode, Mode::AccessPoint);
        assert!(!report.skipped);
        assert_eq!(report.matched, None);
        assert!(!supervisor.handle().is_dirty());
        assert_eq!(supervisor.handle().store().store().writes(), 1);

        // Clean config is not rewritten
        supervisor.run_cycle().unwrap();
        assert_eq!(supervisor.handle().store().store().writes(), 1);
    }

    #[test]
    fn test_access_point_failure_skips_cycle() {
        let mut radio = SimulatedRadio::new();
        radio.fail_start(true);
        let mut supervisor = supervisor(radio);

        let report = supervisor.run_cycle().unwrap();
        assert!(report.skipped);
        assert_eq!(report.mode, Mode::Idle);
        assert!(!supervisor.handle().has_interface());

        radio_mut(&mut supervisor).fail_start(false);
        let report = supervisor.run_cycle().unwrap();
        assert!(!report.skipped);
        assert_eq!(report.mode, Mode::AccessPoint);
    }

    #[test]
    fn test_stronger_network_is_joined() {
        let mut radio = SimulatedRadio::new();
        radio.add_network("A", -80, true);
        radio.add_network("B", -40, true);
        let mut supervisor = Supervisor::new(NetworkSettings::default(), radio, store_with(&["A", "B"]));

        let report = supervisor.run_cycle().unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.matched.as_deref(), Some(&b"B"[..]));
        assert_eq!(report.joined, Some(true));
        assert_eq!(report.mode, Mode::Station);
        assert_eq!(supervisor.handle().machine().driver().associated_ssid(), Some(&b"B"[..]));
    }

    #[test]
    fn test_no_overlap_stays_access_point() {
        let mut radio = SimulatedRadio::new();
        radio.add_network("neighbour", -30, true);
        let mut supervisor = Supervisor::new(NetworkSettings::default(), radio, store_with(&["home"]));

        for _ in 0..3 {
            let report = supervisor.run_cycle().unwrap();
            assert_eq!(report.matched, None);
            assert_eq!(report.joined, None);
            assert_eq!(report.mode, Mode::AccessPoint);
        }
        assert_eq!(supervisor.handle().machine().driver().interfaces_created(), 1);
    }

    #[test]
    fn test_failed_join_retries_through_access_point() {
        let mut radio = SimulatedRadio::new();
        radio.add_network("home", -50, false);
        let mut supervisor = Supervisor::new(NetworkSettings::default(), radio, store_with(&["home"]));

        for _ in 0..4 {
            let report = supervisor.run_cycle().unwrap();
            assert_eq!(report.joined, Some(false));
            assert_eq!(report.mode, Mode::Idle);
            assert!(!supervisor.handle().has_interface());
            assert_eq!(supervisor.handle().machine().driver().live_interfaces(), 0);
        }

        radio_mut(&mut supervisor).set_joinable("home", true);
        let report = supervisor.run_cycle().unwrap();
        assert_eq!(report.joined, Some(true));
        assert_eq!(report.mode, Mode::Station);
        assert_eq!(supervisor.handle().machine().driver().live_interfaces(), 1);
    }

    #[test]
    fn test_connected_station_keeps_network_when_better_one_appears() {
        let mut radio = SimulatedRadio::new();
        radio.add_network("home", -60, true);
        let mut supervisor =
            Supervisor::new(NetworkSettings::default(), radio, store_with(&["home", "office"]));
        supervisor.run_cycle().unwrap();
        assert_eq!(supervisor.handle().mode(), Mode::Station);

        radio_mut(&mut supervisor).add_network("office", -20, true);
        let report = supervisor.run_cycle().unwrap();
        assert_eq!(report.matched.as_deref(), Some(&b"office"[..]));
        assert_eq!(report.joined, Some(true));
        assert_eq!(report.mode, Mode::Station);
        assert_eq!(
            supervisor.handle().machine().driver().associated_ssid(),
            Some(&b"home"[..])
        );
    }

    // ==================== Mask Policy Tests ====================

    fn unmasked_store() -> MemoryStore {
        let mut config = DeviceNetworkConfig::new(ap_profile());
        config.set_station(0, profile("home")).unwrap();
        config.sta_mask = 0;
        store_holding(&config)
    }

    #[test]
    fn test_ignore_policy_joins_unmasked_slot() {
        let mut radio = SimulatedRadio::new();
        radio.add_network("home", -50, true);
        let settings = NetworkSettings {
            mask_policy: MaskPolicy::Ignore,
            ..NetworkSettings::default()
        };
        let mut supervisor = Supervisor::new(settings, radio, unmasked_store());

        let report = supervisor.run_cycle().unwrap();
        assert_eq!(report.mode, Mode::Station);
    }

    #[test]
    fn test_enforce_policy_skips_unmasked_slot() {
        let mut radio = SimulatedRadio::new();
        radio.add_network("home", -50, true);
        let settings = NetworkSettings {
            mask_policy: MaskPolicy::Enforce,
            ..NetworkSettings::default()
        };
        let mut supervisor = Supervisor::new(settings, radio, unmasked_store());

        let report = supervisor.run_cycle().unwrap();
        assert_eq!(report.matched, None);
        assert_eq!(report.mode, Mode::AccessPoint);
    }

    // ==================== Fatal Error Tests ====================

    #[test]
    fn test_persist_failure_is_fatal() {
        let mut store = MemoryStore::new();
        store.fail_writes(true);
        let mut supervisor = Supervisor::new(NetworkSettings::default(), SimulatedRadio::new(), store);

        let err = supervisor.run_cycle().unwrap_err();
        assert!(matches!(err, SupervisorError::Persist(_)));
        assert_eq!(supervisor.handle().mode(), Mode::Idle);
        assert!(supervisor.handle().is_dirty());
        assert!(supervisor.handle().machine().driver().calls().is_empty());
    }

    #[test]
    fn test_scan_failure_is_fatal() {
        let mut radio = SimulatedRadio::new();
        radio.fail_scan(true);
        let mut supervisor = supervisor(radio);

        let err = supervisor.run_cycle().unwrap_err();
        assert!(matches!(err, SupervisorError::Scan(_)));
    }

    #[test]
    fn test_error_display() {
        let err = SupervisorError::from(DriverError::NotInitialized);
        assert_eq!(err.to_string(), "scan failed: radio not initialized");
        let err = SupervisorError::from(StoreError::NotFound);
        assert_eq!(err.to_string(), "failed to persist configuration: not found");
    }

    // ==================== Event Tests ====================

    #[test]
    fn test_events_are_drained_without_changing_mode() {
        let mut radio = SimulatedRadio::new();
        radio.add_network("home", -50, true);
        let mut supervisor = Supervisor::new(NetworkSettings::default(), radio, store_with(&["home"]));

        let report = supervisor.run_cycle().unwrap();
        // started, connected, got IP
        assert_eq!(report.events, 3);
        assert_eq!(report.mode, Mode::Station);

        let report = supervisor.run_cycle().unwrap();
        assert_eq!(report.events, 0);
        assert_eq!(report.mode, Mode::Station);
    }

    #[test]
    fn test_failed_join_events_do_not_change_mode() {
        let mut radio = SimulatedRadio::new();
        radio.add_network("home", -50, false);
        let mut supervisor = Supervisor::new(NetworkSettings::default(), radio, store_with(&["home"]));

        let report = supervisor.run_cycle().unwrap();
        // started, disconnected
        assert_eq!(report.events, 2);
        assert_eq!(report.mode, Mode::Idle);
    }
}
