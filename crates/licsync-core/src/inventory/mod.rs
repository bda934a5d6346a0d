//! Collaborator interfaces
//!
//! The engine talks to two external systems only through these traits:
//! - [`Inventory`]: list/get/update/delete server-license-records
//! - [`HostRegistry`]: resolve host registrations
//!
//! Implementations must report a missing resource as
//! [`InventoryError::NotFound`] and nothing else; classification depends on
//! that distinction.

pub mod memory;

pub use memory::{CallLog, MemoryInventory, Snapshot};

use crate::error::InventoryError;
use crate::model::{HostRegistration, ServerFilter, ServerLicenseRecord, ServerLocator};
use crate::planner::PropertyPatch;
use crate::reference::HostReference;
use crate::session::SessionContext;

/// Server-license-record store
#[async_trait::async_trait]
pub trait Inventory: Send + Sync {
    /// List every record inside `filter`
    async fn list_servers(
        &self,
        session: &SessionContext,
        filter: &ServerFilter,
    ) -> Result<Vec<ServerLicenseRecord>, InventoryError>;

    /// Read one record
    async fn get_server(
        &self,
        session: &SessionContext,
        locator: &ServerLocator,
    ) -> Result<ServerLicenseRecord, InventoryError>;

    /// Write a property patch; returns the record as stored afterwards
    async fn update_properties(
        &self,
        session: &SessionContext,
        resource_id: &str,
        patch: &PropertyPatch,
    ) -> Result<ServerLicenseRecord, InventoryError>;

    /// Delete a record
    async fn delete_server(
        &self,
        session: &SessionContext,
        resource_id: &str,
    ) -> Result<(), InventoryError>;
}

/// Host registration lookup
#[async_trait::async_trait]
pub trait HostRegistry: Send + Sync {
    /// Resolve a host; `Err(InventoryError::NotFound)` when it does not exist
    async fn lookup(
        &self,
        session: &SessionContext,
        reference: &HostReference,
    ) -> Result<HostRegistration, InventoryError>;
}
