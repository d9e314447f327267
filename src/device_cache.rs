//! Typed access to the values a [`DeviceReconciler`](crate::DeviceReconciler) persists between
//! polls and sessions.

use log::warn;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::StoreError;
use crate::rpc_payloads::{ApplicationItem, RemoteKey, SourceItem};
use crate::state::PowerState;
use crate::store::KeyValueStore;

pub(crate) const KEY_POWER_STATUS: &str = "power_status";
pub(crate) const KEY_BOOT_PHASE_TIMESTAMP: &str = "ts_last_failed_power_status";
pub(crate) const KEY_SOURCE_LIST: &str = "source_list";
pub(crate) const KEY_APPLICATION_LIST: &str = "application_list";
pub(crate) const KEY_REMOTE_CONTROLLER_INFO: &str = "remote_controller_info";

pub struct DeviceCache {
    store: Box<dyn KeyValueStore>,
}

impl DeviceCache {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        DeviceCache { store }
    }

    pub fn last_power_state(&self) -> Option<PowerState> {
        self.get_json(KEY_POWER_STATUS)
    }

    pub fn set_last_power_state(&mut self, state: PowerState) -> Result<(), StoreError> {
        self.put_json(KEY_POWER_STATUS, &state)
    }

    /// Unix time of the most recent failed power-status query.
    pub fn boot_phase_timestamp(&self) -> Option<u64> {
        self.get_json(KEY_BOOT_PHASE_TIMESTAMP)
    }

    pub fn record_failed_power_query(&mut self, timestamp: u64) -> Result<(), StoreError> {
        self.put_json(KEY_BOOT_PHASE_TIMESTAMP, &timestamp)
    }

    pub fn source_list(&self) -> Option<Vec<SourceItem>> {
        self.get_json(KEY_SOURCE_LIST)
    }

    pub fn set_source_list(&mut self, sources: &[SourceItem]) -> Result<(), StoreError> {
        self.put_json(KEY_SOURCE_LIST, sources)
    }

    pub fn application_list(&self) -> Option<Vec<ApplicationItem>> {
        self.get_json(KEY_APPLICATION_LIST)
    }

    pub fn set_application_list(&mut self, applications: &[ApplicationItem]) -> Result<(), StoreError> {
        self.put_json(KEY_APPLICATION_LIST, applications)
    }

    pub fn remote_keys(&self) -> Option<Vec<RemoteKey>> {
        self.get_json(KEY_REMOTE_CONTROLLER_INFO)
    }

    pub fn set_remote_keys(&mut self, keys: &[RemoteKey]) -> Result<(), StoreError> {
        self.put_json(KEY_REMOTE_CONTROLLER_INFO, keys)
    }

    // Private ------------------------------------------------------------------------------------

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring unreadable cached value for '{}': {:?}", key, e);
                None
            }
        }
    }

    fn put_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StoreError::Serialization(format!("{}: {:?}", key, e)))?;

        self.store.put(key, raw)
    }
}

// ================================================================================================
// Tests
