//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use pomocoin_core::{KvStore, MemoryStore, StorageError};

/// A [`MemoryStore`] that can be told to fail its next read of one key, or
/// its next remove, with [`StorageError::Locked`].
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_get: Mutex<Option<String>>,
    failing_remove: Mutex<bool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_get(&self, key: &str) {
        *self.failing_get.lock().unwrap() = Some(key.to_string());
    }

    pub fn fail_next_remove(&self) {
        *self.failing_remove.lock().unwrap() = true;
    }
}

impl KvStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut failing = self.failing_get.lock().unwrap();
        if failing.as_deref() == Some(key) {
            *failing = None;
            return Err(StorageError::Locked);
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if std::mem::take(&mut *self.failing_remove.lock().unwrap()) {
            return Err(StorageError::Locked);
        }
        self.inner.remove(key)
    }
}
