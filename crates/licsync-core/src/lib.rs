//! licsync core - reconciliation and license mutation
//!
//! Builds a consistent view of registered database servers and the hosts
//! they claim to run on, then:
//! - Classifies each server as valid, orphaned or unverifiable
//! - Plans the minimal property patch to reach a target license mode
//! - Applies patches and orphan deletes with per-record isolation and dry run
//! - Writes an auditable before/after report
//!
//! # Example
//!
//! ```rust,ignore
//! use licsync_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let inventory = Arc::new(MemoryInventory::load("snapshot.json")?);
//! let session = Arc::new(SessionContext::anonymous("sub-1")?);
//! let engine = ExecutionEngine::new(inventory.clone(), inventory, session);
//!
//! let items = vec![WorkItem::from(InputRecord::new("rg-sql", "sql01"))];
//! let mode = RunMode::Convert(DesiredConfiguration::payg());
//! let outcomes = engine.run(items, &mode, &RunOptions::new().with_dry_run(true)).await;
//!
//! let report = ReportBuilder::new(ReportKind::Conversion, "reports").build(outcomes, chrono::Utc::now());
//! println!("{} skipped", report.summary.skipped);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod model;
pub mod outcome;
pub mod planner;
pub mod reference;
pub mod report;
pub mod session;

pub use classifier::{classify, HostLookup, RecordStatus};
pub use config::{LicsyncConfig, PacingPolicy, PropertyKeys};
pub use engine::{
    Clock, ExecutionEngine, FixedClock, InputRecord, RunMode, RunOptions, SystemClock, WorkItem,
    WHATIF_NOT_EXECUTED,
};
pub use error::{
    ConfigError, InventoryError, LicsyncError, LicsyncResult, ReferenceError, ReportError,
};
pub use inventory::{HostRegistry, Inventory, MemoryInventory, Snapshot};
pub use model::{
    HostRegistration, LicenseConfiguration, LicenseType, PhysicalCoreLicense, PropertyMap,
    ServerFilter, ServerLicenseRecord, ServerLocator,
};
pub use outcome::{OrphanAction, OutcomeStatus, ProcessingOutcome, RecordIdentity, RunSummary};
pub use planner::{DesiredConfiguration, MutationPlanner, Plan, PropertyPatch, ALREADY_CONFIGURED};
pub use reference::HostReference;
pub use report::{read_report, Report, ReportBuilder, ReportKind, ReportRow, ReportSerializer};
pub use session::{Credential, SessionContext};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a run
    pub use crate::{
        DesiredConfiguration, ExecutionEngine, HostRegistry, InputRecord, Inventory,
        LicsyncConfig, MemoryInventory, PacingPolicy, ProcessingOutcome, ReportBuilder,
        ReportKind, RunMode, RunOptions, RunSummary, SessionContext, WorkItem,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
