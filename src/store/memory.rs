//! In-process key-value store.

use super::{KeyValueStore, StoreError};
use std::collections::HashMap;

/// Key-value store held in memory.
///
/// Reads and writes can be made to fail to exercise error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
    writes: usize,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Backend("simulated read failure".into()));
        }
        self.entries.get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Backend("simulated write failure".into()));
        }
        self.entries.insert(key.to_string(), value.to_vec());
        self.writes += 1;
        Ok(())
    }
}
