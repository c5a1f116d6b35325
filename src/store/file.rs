//! File-backed key-value store for host (development) builds.
//!
//! Each key is a file inside the store directory, holding the raw value.
//! Uses `~/.bmp-wifi-esp32/` by default.

use super::{KeyValueStore, StoreError};
use log::info;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Get the default store directory.
///
/// Returns `~/.bmp-wifi-esp32`
pub fn default_store_dir() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home).join(".bmp-wifi-esp32"))
}

/// Key-value store with one file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Open the store at [`default_store_dir`].
    pub fn open_default() -> io::Result<Self> {
        Ok(Self::new(default_store_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StoreError::Backend(format!("invalid key: {:?}", key)));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No value stored at {:?}", path);
                Err(StoreError::NotFound)
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(StoreError::Io)?;
        fs::write(&path, value).map_err(StoreError::Io)?;

        // Verify write by reading back
        let read_back = fs::read(&path).map_err(StoreError::Io)?;
        if read_back != value {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "verification failed: wrote {} bytes, read {} bytes",
                    value.len(),
                    read_back.len()
                ),
            )));
        }

        info!("Stored {} ({} bytes) in {:?}", key, value.len(), self.dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Counter to ensure unique test directories even in parallel execution
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_store_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        env::temp_dir().join(format!("bmp-wifi-test-{}-{}", pid, id))
    }

    #[test]
    fn test_put_get_roundtrip() {
        let dir = unique_store_dir();
        let mut store = FileStore::new(&dir);

        store.put("device-wifi-cfg", &[1, 2, 3, 0, 255]).unwrap();
        assert_eq!(store.get("device-wifi-cfg").unwrap(), vec![1, 2, 3, 0, 255]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let dir = unique_store_dir();
        let store = FileStore::new(&dir);
        assert!(matches!(store.get("device-wifi-cfg"), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = unique_store_dir();
        FileStore::new(&dir).put("k", b"persisted").unwrap();

        let reopened = FileStore::new(&dir);
        assert_eq!(reopened.get("k").unwrap(), b"persisted");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejects_path_keys() {
        let mut store = FileStore::new(unique_store_dir());
        assert!(matches!(store.put("../escape", b"x"), Err(StoreError::Backend(_))));
        assert!(matches!(store.get(""), Err(StoreError::Backend(_))));
    }
}
