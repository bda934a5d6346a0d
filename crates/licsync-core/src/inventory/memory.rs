//! In-memory inventory
//!
//! Backs offline runs (`--snapshot`) and tests. Holds servers and hosts in
//! insertion order, records every call, and can be told to fail specific
//! calls.

use super::{HostRegistry, Inventory};
use crate::error::{InventoryError, LicsyncError, LicsyncResult};
use crate::model::{HostRegistration, ServerFilter, ServerLicenseRecord, ServerLocator};
use crate::planner::PropertyPatch;
use crate::reference::HostReference;
use crate::session::SessionContext;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Serialized form of an in-memory inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Server-license-records
    #[serde(default)]
    pub servers: Vec<ServerLicenseRecord>,
    /// Host registrations
    #[serde(default)]
    pub hosts: Vec<HostRegistration>,
}

/// Calls observed by a [`MemoryInventory`]
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    /// `get_server` locators, in call order
    pub gets: Vec<ServerLocator>,
    /// `update_properties` calls as `(resource id, patch)`
    pub updates: Vec<(String, PropertyPatch)>,
    /// `delete_server` resource ids
    pub deletes: Vec<String>,
    /// `lookup` references
    pub lookups: Vec<HostReference>,
}

#[derive(Debug, Default)]
struct Faults {
    get: HashMap<String, InventoryError>,
    update: HashMap<String, InventoryError>,
    delete: HashMap<String, InventoryError>,
    lookup: HashMap<String, InventoryError>,
}

/// Inventory and host registry held in memory
#[derive(Debug, Default)]
pub struct MemoryInventory {
    state: Mutex<Snapshot>,
    faults: Mutex<Faults>,
    calls: Mutex<CallLog>,
}

impl MemoryInventory {
    /// Create empty inventory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    /// Load a JSON snapshot file
    ///
    /// # Errors
    /// Returns [`LicsyncError::Input`] if the file is unreadable or not a snapshot
    pub fn load(path: impl AsRef<Path>) -> LicsyncResult<Self> {
        let path = path.as_ref();
        let input_error = |reason: String| LicsyncError::Input {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| input_error(e.to_string()))?;
        let snapshot: Snapshot =
            serde_json::from_str(&text).map_err(|e| input_error(format!("not a snapshot: {e}")))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current state back as a JSON snapshot
    ///
    /// # Errors
    /// Returns [`LicsyncError::Input`] if the file cannot be written
    pub fn persist(&self, path: impl AsRef<Path>) -> LicsyncResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&*self.state.lock()).map_err(|e| {
            LicsyncError::Input {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        std::fs::write(path, json).map_err(|e| LicsyncError::Input {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Add a server record
    #[must_use]
    pub fn with_server(self, record: ServerLicenseRecord) -> Self {
        self.state.lock().servers.push(record);
        self
    }

    /// Add a host registration
    #[must_use]
    pub fn with_host(self, host: HostRegistration) -> Self {
        self.state.lock().hosts.push(host);
        self
    }

    /// Fail `get_server` for the named server
    #[must_use]
    pub fn fail_get(self, server_name: &str, error: InventoryError) -> Self {
        self.faults.lock().get.insert(server_name.to_ascii_lowercase(), error);
        self
    }

    /// Fail `update_properties` for the given resource id
    #[must_use]
    pub fn fail_update(self, resource_id: &str, error: InventoryError) -> Self {
        self.faults.lock().update.insert(resource_id.to_ascii_lowercase(), error);
        self
    }

    /// Fail `delete_server` for the given resource id
    #[must_use]
    pub fn fail_delete(self, resource_id: &str, error: InventoryError) -> Self {
        self.faults.lock().delete.insert(resource_id.to_ascii_lowercase(), error);
        self
    }

    /// Fail `lookup` for the named host
    #[must_use]
    pub fn fail_lookup(self, host_name: &str, error: InventoryError) -> Self {
        self.faults.lock().lookup.insert(host_name.to_ascii_lowercase(), error);
        self
    }

    /// Copy of the observed calls
    #[must_use]
    pub fn calls(&self) -> CallLog {
        self.calls.lock().clone()
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().clone()
    }

    /// Current copy of a server by resource id
    #[must_use]
    pub fn server(&self, resource_id: &str) -> Option<ServerLicenseRecord> {
        self.state
            .lock()
            .servers
            .iter()
            .find(|s| s.resource_id.eq_ignore_ascii_case(resource_id))
            .cloned()
    }
}

#[async_trait::async_trait]
impl Inventory for MemoryInventory {
    async fn list_servers(
        &self,
        _session: &SessionContext,
        filter: &ServerFilter,
    ) -> Result<Vec<ServerLicenseRecord>, InventoryError> {
        Ok(self
            .state
            .lock()
            .servers
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn get_server(
        &self,
        _session: &SessionContext,
        locator: &ServerLocator,
    ) -> Result<ServerLicenseRecord, InventoryError> {
        self.calls.lock().gets.push(locator.clone());
        if let Some(err) = self.faults.lock().get.get(&locator.name.to_ascii_lowercase()) {
            return Err(err.clone());
        }
        self.state
            .lock()
            .servers
            .iter()
            .find(|s| {
                s.name.eq_ignore_ascii_case(&locator.name)
                    && s.resource_group.eq_ignore_ascii_case(&locator.resource_group)
            })
            .cloned()
            .ok_or_else(|| InventoryError::NotFound(locator.to_string()))
    }

    async fn update_properties(
        &self,
        _session: &SessionContext,
        resource_id: &str,
        patch: &PropertyPatch,
    ) -> Result<ServerLicenseRecord, InventoryError> {
        self.calls
            .lock()
            .updates
            .push((resource_id.to_string(), patch.clone()));
        if let Some(err) = self.faults.lock().update.get(&resource_id.to_ascii_lowercase()) {
            return Err(err.clone());
        }
        let mut state = self.state.lock();
        let record = state
            .servers
            .iter_mut()
            .find(|s| s.resource_id.eq_ignore_ascii_case(resource_id))
            .ok_or_else(|| InventoryError::NotFound(resource_id.to_string()))?;
        patch.apply_to(&mut record.properties);
        Ok(record.clone())
    }

    async fn delete_server(
        &self,
        _session: &SessionContext,
        resource_id: &str,
    ) -> Result<(), InventoryError> {
        self.calls.lock().deletes.push(resource_id.to_string());
        if let Some(err) = self.faults.lock().delete.get(&resource_id.to_ascii_lowercase()) {
            return Err(err.clone());
        }
        let mut state = self.state.lock();
        let before = state.servers.len();
        state
            .servers
            .retain(|s| !s.resource_id.eq_ignore_ascii_case(resource_id));
        if state.servers.len() == before {
            return Err(InventoryError::NotFound(resource_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl HostRegistry for MemoryInventory {
    async fn lookup(
        &self,
        _session: &SessionContext,
        reference: &HostReference,
    ) -> Result<HostRegistration, InventoryError> {
        self.calls.lock().lookups.push(reference.clone());
        if let Some(err) = self.faults.lock().lookup.get(&reference.name.to_ascii_lowercase()) {
            return Err(err.clone());
        }
        self.state
            .lock()
            .hosts
            .iter()
            .find(|h| {
                h.name.eq_ignore_ascii_case(&reference.name)
                    && h.resource_group.eq_ignore_ascii_case(&reference.resource_group)
            })
            .cloned()
            .ok_or_else(|| InventoryError::NotFound(reference.to_string()))
    }
}
