//! Persistent storage for the device network configuration.
//!
//! # Components
//!
//! - [`KeyValueStore`] - blob store capability (`get`/`put` by key)
//! - [`ConfigStore`] - loads the configuration record, regenerates defaults
//!   when it is missing or corrupt, and writes it back lazily
//! - [`MemoryStore`] - in-process store for tests and simulation
//! - [`FileStore`] - one file per key, for host builds
//! - `NvsStore` - ESP-IDF NVS namespace (ESP32 only)

mod file;
mod memory;
#[cfg(feature = "esp32")]
mod nvs;

pub use file::{default_store_dir, FileStore};
pub use memory::MemoryStore;
#[cfg(feature = "esp32")]
pub use nvs::{take_default_partition, NvsStore};

use crate::config::DeviceNetworkConfig;
use log::{info, warn};
use std::fmt;

/// Storage namespace holding the configuration record.
pub const CONFIG_NAMESPACE: &str = "config";

/// Key of the configuration record.
pub const CONFIG_KEY: &str = "device-wifi-cfg";

/// Blob storage keyed by name.
pub trait KeyValueStore {
    /// Read the value stored under `key`.
    ///
    /// Returns [`StoreError::NotFound`] when nothing is stored.
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// Loads and saves the configuration record, tracking unsaved changes.
pub struct ConfigStore<S> {
    store: S,
    dirty: bool,
}

impl<S: KeyValueStore> ConfigStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            dirty: false,
        }
    }

    /// Load the configuration record.
    ///
    /// A missing, unreadable, or corrupt record is replaced by `defaults()`
    /// and marked dirty. Never fails.
    pub fn load(
        &mut self,
        defaults: impl FnOnce() -> DeviceNetworkConfig,
    ) -> DeviceNetworkConfig {
        let bytes = match self.store.get(CONFIG_KEY) {
            Ok(bytes) => Some(bytes),
            Err(StoreError::NotFound) => {
                info!("No network configuration stored, generating defaults");
                None
            }
            Err(e) => {
                warn!("Failed to read network configuration: {}", e);
                None
            }
        };

        let decoded = bytes.map(|bytes| DeviceNetworkConfig::from_bytes(&bytes));
        match decoded {
            Some(Ok(config)) => {
                self.dirty = false;
                config
            }
            Some(Err(e)) => {
                warn!("Stored network configuration rejected ({}), regenerating", e);
                self.dirty = true;
                defaults()
            }
            None => {
                self.dirty = true;
                defaults()
            }
        }
    }

    /// Write `config` if there are unsaved changes.
    ///
    /// The dirty flag is cleared only after a successful write.
    pub fn save(&mut self, config: &DeviceNetworkConfig) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        self.store.put(CONFIG_KEY, &config.to_bytes())?;
        self.dirty = false;
        info!("Network configuration saved");
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the in-memory record as differing from storage.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

/// Errors from the persistent store.
#[derive(Debug)]
pub enum StoreError {
    /// Nothing stored under the key.
    NotFound,
    /// Host file system error.
    Io(std::io::Error),
    /// Storage backend error (e.g. NVS).
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Backend(msg) => write!(f, "storage backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(e)
        }
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for StoreError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Backend(format!("ESP error: {:?}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkProfile, CONFIG_MAGIC, RECORD_LEN};

    fn defaults() -> DeviceNetworkConfig {
        DeviceNetworkConfig::new(NetworkProfile::new("blackmagic", "helloworld").unwrap())
    }

    fn stored_config() -> DeviceNetworkConfig {
        let mut config =
            DeviceNetworkConfig::new(NetworkProfile::new("bmp-ap", "apsecret1").unwrap());
        config
            .set_station(2, NetworkProfile::new("lab", "labsecret").unwrap())
            .unwrap();
        config
    }

    // ==================== Load Tests ====================

    #[test]
    fn test_load_missing_record_gives_dirty_defaults() {
        let mut store = ConfigStore::new(MemoryStore::new());
        let config = store.load(defaults);
        assert_eq!(config, defaults());
        assert!(store.is_dirty());
    }

    #[test]
    fn test_load_valid_record_is_clean() {
        let mut memory = MemoryStore::new();
        memory.put(CONFIG_KEY, &stored_config().to_bytes()).unwrap();

        let mut store = ConfigStore::new(memory);
        let config = store.load(defaults);
        assert_eq!(config, stored_config());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_load_bad_magic_gives_dirty_defaults() {
        let mut bytes = stored_config().to_bytes();
        bytes[..4].copy_from_slice(&(CONFIG_MAGIC + 1).to_le_bytes());
        let mut memory = MemoryStore::new();
        memory.put(CONFIG_KEY, &bytes).unwrap();

        let mut store = ConfigStore::new(memory);
        assert_eq!(store.load(defaults), defaults());
        assert!(store.is_dirty());
    }

    #[test]
    fn test_load_truncated_record_gives_dirty_defaults() {
        let bytes = stored_config().to_bytes();
        let mut memory = MemoryStore::new();
        memory.put(CONFIG_KEY, &bytes[..RECORD_LEN / 2]).unwrap();

        let mut store = ConfigStore::new(memory);
        assert_eq!(store.load(defaults), defaults());
        assert!(store.is_dirty());
    }

    #[test]
    fn test_load_read_failure_gives_dirty_defaults() {
        let mut memory = MemoryStore::new();
        memory.fail_reads(true);

        let mut store = ConfigStore::new(memory);
        assert_eq!(store.load(defaults), defaults());
        assert!(store.is_dirty());
    }

    // ==================== Save Tests ====================

    #[test]
    fn test_save_clean_config_skips_write() {
        let mut store = ConfigStore::new(MemoryStore::new());
        store.save(&stored_config()).unwrap();
        assert_eq!(store.store().writes(), 0);
        assert!(matches!(store.store().get(CONFIG_KEY), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_save_dirty_config_writes_and_clears() {
        let mut store = ConfigStore::new(MemoryStore::new());
        let config = store.load(defaults);
        store.save(&config).unwrap();
        assert!(!store.is_dirty());
        assert_eq!(store.store().writes(), 1);

        // Second save is a no-op
        store.save(&config).unwrap();
        assert_eq!(store.store().writes(), 1);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let mut store = ConfigStore::new(MemoryStore::new());
        store.mark_dirty();
        store.save(&stored_config()).unwrap();

        let mut reloaded = ConfigStore::new(store.store().clone());
        let config = reloaded.load(defaults);
        assert_eq!(config, stored_config());
        assert_eq!(config.to_bytes(), stored_config().to_bytes());
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn test_save_failure_keeps_dirty() {
        let mut store = ConfigStore::new(MemoryStore::new());
        let config = store.load(defaults);
        store.store_mut().fail_writes(true);

        assert!(store.save(&config).is_err());
        assert!(store.is_dirty());
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: StoreError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(matches!(err, StoreError::NotFound));
    }
}
