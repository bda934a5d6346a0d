//! Execution engine
//!
//! Drives one pass over a list of work items. Every item produces exactly
//! one [`ProcessingOutcome`], in input order, whatever happens to it:
//!
//! 1. Resolve the current record (input locators are fetched, listed
//!    records are used as-is)
//! 2. Plan (convert) or classify (reconcile)
//! 3. Apply the action unless this is a dry run
//! 4. Capture the outcome
//!
//! Failures are captured per record and never cancel the rest of the run.

use crate::classifier::{classify, HostLookup, RecordStatus};
use crate::config::PacingPolicy;
use crate::inventory::{HostRegistry, Inventory};
use crate::model::{LicenseConfiguration, ServerLicenseRecord, ServerLocator};
use crate::outcome::{OrphanAction, OutcomeStatus, ProcessingOutcome, RecordIdentity};
use crate::planner::{DesiredConfiguration, MutationPlanner, Plan};
use crate::reference::HostReference;
use crate::session::SessionContext;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;

/// Message recorded for changes suppressed by a dry run
pub const WHATIF_NOT_EXECUTED: &str = "WhatIf — not executed";

/// Source of outcome and patch timestamps
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A server named by an input file, not yet fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    /// Where to find the record
    pub locator: ServerLocator,
    /// Host machine name from the input, if given
    pub machine: Option<String>,
    /// Region from the input, if given
    pub location: Option<String>,
}

impl InputRecord {
    /// Create input record
    #[inline]
    #[must_use]
    pub fn new(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            locator: ServerLocator::new(resource_group, name),
            machine: None,
            location: None,
        }
    }

    /// With machine name
    #[inline]
    #[must_use]
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = Some(machine.into());
        self
    }

    /// With location
    #[inline]
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    fn identity(&self) -> RecordIdentity {
        RecordIdentity::new(&self.locator.name, &self.locator.resource_group)
            .with_machine(self.machine.clone())
            .with_location(self.location.clone())
    }
}

/// One unit of engine input
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    /// Named in an input file; resolved through `get_server`
    Input(InputRecord),
    /// Already returned by `list_servers`; not fetched again
    Listed(ServerLicenseRecord),
}

impl From<InputRecord> for WorkItem {
    fn from(input: InputRecord) -> Self {
        Self::Input(input)
    }
}

impl From<ServerLicenseRecord> for WorkItem {
    fn from(record: ServerLicenseRecord) -> Self {
        Self::Listed(record)
    }
}

/// What a run does to each record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Bring records to a target license configuration
    Convert(DesiredConfiguration),
    /// Verify host references, optionally deleting orphans
    Reconcile {
        /// Delete records classified as orphaned
        delete_orphans: bool,
    },
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Convert(_) => f.write_str("convert"),
            Self::Reconcile { .. } => f.write_str("reconcile"),
        }
    }
}

/// Per-run switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Suppress every write and delete
    pub dry_run: bool,
    /// Dispatch pacing
    pub pacing: PacingPolicy,
}

impl RunOptions {
    /// Sequential, live run
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With dry run
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// With pacing
    #[inline]
    #[must_use]
    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }
}

/// Runs work items against the inventory and host registry
pub struct ExecutionEngine {
    inventory: Arc<dyn Inventory>,
    hosts: Arc<dyn HostRegistry>,
    session: Arc<SessionContext>,
    planner: MutationPlanner,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("session", &self.session)
            .field("planner", &self.planner)
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    /// Create engine with default property keys and the wall clock
    #[must_use]
    pub fn new(
        inventory: Arc<dyn Inventory>,
        hosts: Arc<dyn HostRegistry>,
        session: Arc<SessionContext>,
    ) -> Self {
        Self {
            inventory,
            hosts,
            session,
            planner: MutationPlanner::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// With planner
    #[inline]
    #[must_use]
    pub fn with_planner(mut self, planner: MutationPlanner) -> Self {
        self.planner = planner;
        self
    }

    /// With clock
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Process every item and return one outcome per item, in input order
    ///
    /// With `pacing.workers > 1` up to that many records are in flight at
    /// once; outcomes are still yielded in input order.
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        mode: &RunMode,
        options: &RunOptions,
    ) -> Vec<ProcessingOutcome> {
        let total = items.len();
        let workers = options.pacing.workers.max(1);
        let delay = options.pacing.delay();
        tracing::info!(
            run_id = %self.session.run_id(),
            %mode,
            total,
            workers,
            dry_run = options.dry_run,
            "Starting run"
        );

        let outcomes: Vec<ProcessingOutcome> = stream::iter(items)
            .map(|item| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                self.process(item, mode, options.dry_run).await
            })
            .buffered(workers)
            .collect()
            .await;

        tracing::info!(run_id = %self.session.run_id(), processed = outcomes.len(), "Run finished");
        outcomes
    }

    async fn process(&self, item: WorkItem, mode: &RunMode, dry_run: bool) -> ProcessingOutcome {
        let (identity, record) = match self.resolve(item).await {
            Ok(resolved) => resolved,
            Err(outcome) => return outcome,
        };

        let outcome = match mode {
            RunMode::Convert(desired) => self.convert(identity, &record, desired, dry_run).await,
            RunMode::Reconcile { delete_orphans } => {
                self.reconcile(identity, &record, *delete_orphans, dry_run)
                    .await
            }
        };

        tracing::debug!(
            run_id = %self.session.run_id(),
            server = %outcome.identity.name,
            status = %outcome.status,
            message = outcome.message.as_deref().unwrap_or(""),
            "Record processed"
        );
        outcome
    }

    /// Fetch input locators; a failure becomes the record's outcome
    async fn resolve(
        &self,
        item: WorkItem,
    ) -> Result<(RecordIdentity, ServerLicenseRecord), ProcessingOutcome> {
        match item {
            WorkItem::Listed(record) => {
                let identity = RecordIdentity::new(&record.name, &record.resource_group)
                    .with_machine(record.machine_name())
                    .with_location(record.location.clone());
                Ok((identity, record))
            }
            WorkItem::Input(input) => {
                let identity = input.identity();
                match self.inventory.get_server(&self.session, &input.locator).await {
                    Ok(record) => {
                        let machine = identity.machine.clone().or_else(|| record.machine_name());
                        let location = identity.location.clone().or_else(|| record.location.clone());
                        let identity = identity.with_machine(machine).with_location(location);
                        Ok((identity, record))
                    }
                    Err(e) => {
                        tracing::warn!(server = %input.locator, error = %e, retryable = e.is_retryable(), "Could not read record");
                        Err(ProcessingOutcome::failed(
                            identity,
                            format!("failed to read record: {e}"),
                            self.clock.now(),
                        ))
                    }
                }
            }
        }
    }

    async fn convert(
        &self,
        identity: RecordIdentity,
        record: &ServerLicenseRecord,
        desired: &DesiredConfiguration,
        dry_run: bool,
    ) -> ProcessingOutcome {
        let now = self.clock.now();
        let previous = record.configuration(self.planner.keys());

        let patch = match self.planner.plan(&record.properties, desired, now) {
            Plan::Noop { reason } => {
                return ProcessingOutcome::new(identity, OutcomeStatus::Skipped, now)
                    .with_previous(previous.clone())
                    .with_target(previous)
                    .with_message(reason);
            }
            Plan::Patch(patch) => patch,
        };
        let target: LicenseConfiguration = patch.resulting().clone();

        if dry_run {
            tracing::info!(
                server = %record.name,
                changed = ?patch.changed_keys(),
                "Dry run: would update license configuration"
            );
            return ProcessingOutcome::new(identity, OutcomeStatus::Skipped, now)
                .with_previous(previous)
                .with_target(target)
                .with_message(WHATIF_NOT_EXECUTED);
        }

        match self
            .inventory
            .update_properties(&self.session, &record.resource_id, &patch)
            .await
        {
            Ok(_) => {
                tracing::info!(server = %record.name, license_type = %target.license_type, "License configuration updated");
                ProcessingOutcome::new(identity, OutcomeStatus::Success, self.clock.now())
                    .with_previous(previous)
                    .with_target(target.clone())
                    .with_applied(target)
            }
            Err(e) => {
                tracing::error!(server = %record.name, error = %e, retryable = e.is_retryable(), "License update failed");
                ProcessingOutcome::failed(identity, e.to_string(), self.clock.now())
                    .with_previous(previous)
                    .with_target(target)
            }
        }
    }

    async fn reconcile(
        &self,
        identity: RecordIdentity,
        record: &ServerLicenseRecord,
        delete_orphans: bool,
        dry_run: bool,
    ) -> ProcessingOutcome {
        let previous = record.configuration(self.planner.keys());
        let lookup = self.lookup_host(record).await;
        let status = classify(record, lookup.as_ref());

        let mut outcome = ProcessingOutcome::new(identity, status.into(), self.clock.now())
            .with_previous(previous);
        let detail = match (&status, &lookup) {
            (RecordStatus::OrphanedNoReference, _) => Some("no host reference".to_string()),
            (_, Some(lookup)) => lookup.detail(),
            (_, None) => None,
        };
        if let Some(detail) = detail {
            outcome = outcome.with_message(detail);
        }

        if status == RecordStatus::ErrorChecking {
            tracing::warn!(server = %record.name, "Host could not be verified; record left untouched");
        }
        if !(delete_orphans && status.is_orphaned()) {
            return outcome;
        }

        if dry_run {
            tracing::info!(server = %record.name, %status, "Dry run: would delete orphaned record");
            return outcome.with_action(OrphanAction::WouldDelete);
        }

        match self
            .inventory
            .delete_server(&self.session, &record.resource_id)
            .await
        {
            Ok(()) => {
                tracing::info!(server = %record.name, %status, "Deleted orphaned record");
                outcome.with_action(OrphanAction::Deleted)
            }
            Err(e) => {
                tracing::error!(server = %record.name, error = %e, retryable = e.is_retryable(), "Failed to delete orphaned record");
                let message = match outcome.message.take() {
                    Some(detail) => format!("{detail}; delete failed: {e}"),
                    None => format!("delete failed: {e}"),
                };
                outcome
                    .with_action(OrphanAction::FailedToDelete)
                    .with_message(message)
            }
        }
    }

    async fn lookup_host(&self, record: &ServerLicenseRecord) -> Option<HostLookup> {
        let raw = record.host_reference()?;
        let lookup = match HostReference::parse(raw) {
            Ok(reference) => {
                HostLookup::from_result(self.hosts.lookup(&self.session, &reference).await)
            }
            Err(e) => {
                tracing::warn!(server = %record.name, reference = raw, error = %e, "Unparseable host reference");
                HostLookup::Unparseable(e)
            }
        };
        Some(lookup)
    }
}
