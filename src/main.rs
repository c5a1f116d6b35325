//! Black Magic Debug WiFi firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    use bmp_wifi_esp32::store::{take_default_partition, NvsStore, CONFIG_NAMESPACE};
    use bmp_wifi_esp32::wifi::EspRadio;
    use bmp_wifi_esp32::{spawn_supervisor, NetworkSettings, Supervisor};
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use log::{error, info};

    esp_idf_svc::log::EspLogger::initialize_default();
    info!("=== BMP WiFi starting ===");

    let sysloop = EspSystemEventLoop::take().expect("system event loop");
    let partition = take_default_partition().expect("NVS partition");
    let store = NvsStore::new(partition.clone(), CONFIG_NAMESPACE).expect("NVS namespace");

    let settings = NetworkSettings::from_build_env();
    let radio = EspRadio::new(sysloop, Some(partition), settings.clone());
    let supervisor = Supervisor::new(settings, radio, store);

    let handle = spawn_supervisor(supervisor).expect("spawn wifi manager");
    match handle.join() {
        Ok(e) => error!("WiFi manager exited: {}", e),
        Err(_) => error!("WiFi manager panicked"),
    }

    // Give the log a moment to drain before rebooting
    std::thread::sleep(std::time::Duration::from_secs(1));
    esp_idf_hal::reset::restart();
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-supervisor' to simulate on the host.");
}
