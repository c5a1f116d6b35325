//! Host simulation of the WiFi supervisor.
//!
//! Runs the real supervisor loop against a simulated radio and a file-backed
//! configuration store, so mode changes can be watched without hardware.
//!
//! # Usage
//!
//! ```bash
//! BMP_SIM_NETWORKS="home:-45,cafe:-70" \
//! BMP_SIM_JOINABLE="home" \
//! BMP_SIM_PROFILES="home=password123" \
//! cargo run --bin host-supervisor
//! ```
//!
//! - `BMP_SIM_NETWORKS` - visible networks as `ssid:rssi`, comma separated
//! - `BMP_SIM_JOINABLE` - SSIDs whose connect succeeds (default: none)
//! - `BMP_SIM_PROFILES` - `ssid=password` pairs written to the station slots
//! - `BMP_SIM_CYCLES` - stop after this many cycles (default: run forever)
//! - `BMP_STORE_DIR` - store directory (default: `~/.bmp-wifi-esp32`)

use bmp_wifi_esp32::config::STATION_SLOTS;
use bmp_wifi_esp32::store::FileStore;
use bmp_wifi_esp32::wifi::SimulatedRadio;
use bmp_wifi_esp32::{ConfigStore, NetworkProfile, NetworkSettings, RadioDriver, Supervisor};
use log::{error, info, warn};
use std::env;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== BMP WiFi host simulation starting ===");

    let store = match env::var("BMP_STORE_DIR") {
        Ok(dir) => FileStore::new(dir),
        Err(_) => match FileStore::open_default() {
            Ok(store) => store,
            Err(e) => {
                error!("No store directory: {}", e);
                process::exit(1);
            }
        },
    };
    info!("Store: {:?}", store.dir());

    let settings = NetworkSettings::from_build_env();
    let radio = simulated_radio();

    if let Ok(profiles) = env::var("BMP_SIM_PROFILES") {
        if let Err(e) = seed_profiles(&settings, &radio, store.clone(), &profiles) {
            error!("Failed to store profiles: {}", e);
            process::exit(1);
        }
    }

    let mut supervisor = Supervisor::new(settings, radio, store);

    let cycles = match env::var("BMP_SIM_CYCLES").map(|v| v.parse::<u32>()) {
        Ok(Ok(n)) => n,
        Ok(Err(_)) => {
            error!("BMP_SIM_CYCLES must be a number");
            process::exit(1);
        }
        Err(_) => {
            let e = supervisor.run();
            error!("Supervisor exited: {}", e);
            process::exit(1);
        }
    };

    for cycle in 1..=cycles {
        match supervisor.run_cycle() {
            Ok(report) => info!(
                "Cycle {}: mode={} scanned={} matched={:?} joined={:?}",
                cycle,
                report.mode,
                report.scanned,
                report.matched.as_deref().map(String::from_utf8_lossy),
                report.joined
            ),
            Err(e) => {
                error!("Cycle {} failed: {}", cycle, e);
                process::exit(1);
            }
        }
        if cycle < cycles {
            std::thread::sleep(supervisor.settings().scan_interval);
        }
    }

    info!("=== Simulation finished in mode {} ===", supervisor.handle().mode());
}

fn simulated_radio() -> SimulatedRadio {
    let mut radio = SimulatedRadio::with_random_id();
    let joinable: Vec<String> = env::var("BMP_SIM_JOINABLE")
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    if let Ok(networks) = env::var("BMP_SIM_NETWORKS") {
        for entry in networks.split(',').filter(|e| !e.trim().is_empty()) {
            let Some((ssid, rssi)) = entry.trim().rsplit_once(':') else {
                warn!("Ignoring network {:?}: expected ssid:rssi", entry);
                continue;
            };
            let Ok(rssi) = rssi.parse::<i8>() else {
                warn!("Ignoring network {:?}: bad RSSI", entry);
                continue;
            };
            let is_joinable = joinable.iter().any(|j| j == ssid);
            info!("Simulating {} at {} dBm (joinable: {})", ssid, rssi, is_joinable);
            radio.add_network(ssid, rssi, is_joinable);
        }
    }
    radio
}

/// Write `ssid=password` pairs into the station slots of the stored record.
fn seed_profiles(
    settings: &NetworkSettings,
    radio: &SimulatedRadio,
    store: FileStore,
    profiles: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = ConfigStore::new(store);
    let device_id = radio.device_id();
    let mut config = store.load(|| settings.default_config(device_id));

    let entries = profiles.split(',').filter(|e| !e.trim().is_empty());
    for (slot, entry) in entries.enumerate() {
        if slot >= STATION_SLOTS {
            warn!("Only {} station slots, ignoring the rest", STATION_SLOTS);
            break;
        }
        let (ssid, password) = entry.trim().split_once('=').unwrap_or((entry.trim(), ""));
        let profile = NetworkProfile::new(ssid, password)?;
        info!("Slot {}: {} ({})", slot, ssid, if profile.is_open() { "open" } else { "****" });
        config.set_station(slot, profile)?;
    }

    store.mark_dirty();
    store.save(&config)?;
    Ok(())
}
