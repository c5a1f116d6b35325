//! NVS-backed key-value store.
//!
//! Stores blobs in an ESP-IDF Non-Volatile Storage namespace so the
//! configuration record persists across reboots.

use super::{KeyValueStore, StoreError};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::EspError;
use log::info;

/// Take the default NVS partition.
///
/// `EspDefaultNvsPartition::take` initializes flash and, when the partition
/// has no free pages or was written by a newer layout, erases it and
/// initializes again. Must only be called once.
pub fn take_default_partition() -> Result<EspDefaultNvsPartition, EspError> {
    let partition = EspDefaultNvsPartition::take()?;
    info!("NVS partition ready");
    Ok(partition)
}

/// One NVS namespace used as a blob store.
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStore {
    /// Open `namespace` read-write on `partition`.
    pub fn new(partition: EspDefaultNvsPartition, namespace: &str) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, namespace, true)?;
        Ok(Self { nvs })
    }
}

impl KeyValueStore for NvsStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let len = self.nvs.blob_len(key)?.ok_or(StoreError::NotFound)?;
        let mut buf = vec![0u8; len];
        let bytes = self.nvs.get_raw(key, &mut buf)?.ok_or(StoreError::NotFound)?;
        Ok(bytes.to_vec())
    }

    /// Write with read-back verification to catch silent flash failures.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.nvs.set_raw(key, value)?;

        let mut verify_buf = vec![0u8; value.len()];
        let read_bytes = self
            .nvs
            .get_raw(key, &mut verify_buf)
            .map_err(|e| {
                log::error!("Failed to read back {} after save: {:?}", key, e);
                e
            })?
            .ok_or_else(|| {
                log::error!("{} not found after save - possible flash failure", key);
                StoreError::NotFound
            })?;

        if read_bytes != value {
            log::error!("{} verification failed - data mismatch after save", key);
            return Err(StoreError::Backend(format!("{} verification failed", key)));
        }

        Ok(())
    }
}
