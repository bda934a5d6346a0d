//! Subcommand handlers
//!
//! Everything here is setup: configuration, session, backend, input and
//! output directory. Any failure before the engine starts is returned as an
//! error and ends the process with a non-zero exit code. Once the engine
//! runs, per-record failures only show up in the report.

use crate::console;
use crate::export::write_inventory;
use crate::input::{load_input, restrict_to, retry_candidates};
use anyhow::Context;
use chrono::Utc;
use clap::ArgMatches;
use licsync_core::{
    read_report, DesiredConfiguration, ExecutionEngine, HostRegistry, InputRecord, Inventory,
    LicenseType, LicsyncConfig, LicsyncError, MemoryInventory, MutationPlanner, ReportBuilder,
    ReportKind, RunMode, RunOptions, ServerFilter, SessionContext, WorkItem,
};
use licsync_rest::RestInventory;
use std::path::PathBuf;
use std::sync::Arc;

/// Collaborators for one run
struct Backend {
    inventory: Arc<dyn Inventory>,
    hosts: Arc<dyn HostRegistry>,
    session: Arc<SessionContext>,
    snapshot: Option<(Arc<MemoryInventory>, PathBuf)>,
}

impl Backend {
    async fn connect(args: &ArgMatches, config: &LicsyncConfig) -> anyhow::Result<Self> {
        let subscription = args
            .get_one::<String>("subscription")
            .map(String::as_str)
            .unwrap_or_default();

        if let Some(path) = args.get_one::<PathBuf>("snapshot") {
            let memory = Arc::new(MemoryInventory::load(path)?);
            let session = Arc::new(SessionContext::anonymous(subscription)?);
            tracing::info!(snapshot = %path.display(), "Using offline inventory snapshot");
            return Ok(Self {
                inventory: memory.clone(),
                hosts: memory.clone(),
                session,
                snapshot: Some((memory, path.clone())),
            });
        }

        let session = Arc::new(SessionContext::from_env(subscription)?);
        let rest = Arc::new(RestInventory::new(config.clone()).map_err(LicsyncError::from)?);
        rest.verify_access(&session).await.map_err(|e| {
            if e.is_auth_failure() {
                LicsyncError::Session(format!("credential rejected: {e}"))
            } else {
                LicsyncError::Inventory(e)
            }
        })?;
        tracing::info!(endpoint = %config.endpoint, "Using REST inventory");
        Ok(Self {
            inventory: rest.clone(),
            hosts: rest,
            session,
            snapshot: None,
        })
    }

    fn engine(&self, config: &LicsyncConfig) -> ExecutionEngine {
        ExecutionEngine::new(
            self.inventory.clone(),
            self.hosts.clone(),
            self.session.clone(),
        )
        .with_planner(MutationPlanner::new(config.property_keys.clone()))
    }

    /// Write offline changes back to the snapshot file
    fn persist(&self) -> anyhow::Result<()> {
        if let Some((memory, path)) = &self.snapshot {
            memory.persist(path)?;
            tracing::debug!(snapshot = %path.display(), "Snapshot updated");
        }
        Ok(())
    }
}

/// Configuration file plus command-line overrides
pub fn load_config(args: &ArgMatches) -> anyhow::Result<LicsyncConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => LicsyncConfig::from_file(path).map_err(LicsyncError::from)?,
        None => LicsyncConfig::new(),
    };
    if let Some(workers) = args.get_one::<usize>("workers") {
        config.pacing = config.pacing.with_workers(*workers);
    }
    if let Some(delay_ms) = args.get_one::<u64>("delay-ms") {
        config.pacing = config.pacing.with_delay_ms(*delay_ms);
    }
    config.validate().map_err(LicsyncError::from)?;
    Ok(config)
}

fn prepare_output_dir(args: &ArgMatches) -> Result<PathBuf, LicsyncError> {
    let dir = args
        .get_one::<PathBuf>("output-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir).map_err(|source| LicsyncError::OutputDirectory {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}

/// Inputs from `--input`, narrowed or replaced by `--retry-from`
fn collect_inputs(args: &ArgMatches) -> anyhow::Result<Option<Vec<InputRecord>>> {
    let inputs = args
        .get_one::<PathBuf>("input")
        .map(|path| load_input(path))
        .transpose()?;

    let Some(report_path) = args.get_one::<PathBuf>("retry-from") else {
        return Ok(inputs);
    };
    let previous = read_report(report_path)
        .map_err(LicsyncError::from)
        .with_context(|| format!("reading {}", report_path.display()))?;
    let candidates = retry_candidates(&previous);
    tracing::info!(report = %report_path.display(), candidates = candidates.len(), "Retrying incomplete records");

    Ok(Some(match inputs {
        Some(inputs) => restrict_to(inputs, &candidates),
        None => candidates,
    }))
}

/// Dispatch the parsed command line
///
/// # Errors
/// Returns setup errors; per-record failures never surface here
pub async fn execute(matches: &ArgMatches) -> anyhow::Result<()> {
    let Some((name, args)) = matches.subcommand() else {
        return Ok(());
    };
    let config = load_config(args)?;

    match name {
        "convert" => convert(&config, args).await,
        "reconcile" => reconcile(&config, args).await,
        "inventory" => inventory(&config, args).await,
        other => anyhow::bail!("unknown command '{other}'"),
    }
}

async fn convert(config: &LicsyncConfig, args: &ArgMatches) -> anyhow::Result<()> {
    let output_dir = prepare_output_dir(args)?;
    let inputs = collect_inputs(args)?.unwrap_or_default();
    let dry_run = args.get_flag("dry-run");
    let desired = DesiredConfiguration::payg()
        .with_license_type(
            args.get_one::<LicenseType>("target-license")
                .copied()
                .unwrap_or(LicenseType::Payg),
        )
        .with_physical_core(args.get_flag("enable-physical-core-license"));

    let backend = Backend::connect(args, config).await?;
    let items: Vec<WorkItem> = inputs.into_iter().map(WorkItem::from).collect();
    let options = RunOptions::new()
        .with_dry_run(dry_run)
        .with_pacing(config.pacing);

    let outcomes = backend
        .engine(config)
        .run(items, &RunMode::Convert(desired), &options)
        .await;
    let report = ReportBuilder::new(ReportKind::Conversion, &output_dir).build(outcomes, Utc::now());

    console::print_report(
        ReportKind::Conversion,
        &report,
        backend.session.subscription_id(),
        dry_run,
        &console::rerun_flags(args),
    );
    if !dry_run {
        backend.persist()?;
    }
    Ok(())
}

async fn reconcile(config: &LicsyncConfig, args: &ArgMatches) -> anyhow::Result<()> {
    let output_dir = prepare_output_dir(args)?;
    let dry_run = args.get_flag("dry-run");
    let delete_orphans = args.get_flag("delete-orphans");
    let filter = args
        .get_one::<String>("resource-group")
        .map_or_else(ServerFilter::all, |rg| ServerFilter::resource_group(rg.as_str()));

    let inputs = collect_inputs(args)?;
    let backend = Backend::connect(args, config).await?;

    let items: Vec<WorkItem> = match inputs {
        Some(inputs) => inputs
            .into_iter()
            .filter(|input| {
                filter.resource_group.as_deref().map_or(true, |rg| {
                    rg.eq_ignore_ascii_case(&input.locator.resource_group)
                })
            })
            .map(WorkItem::from)
            .collect(),
        None => backend
            .inventory
            .list_servers(&backend.session, &filter)
            .await
            .map_err(LicsyncError::from)?
            .into_iter()
            .map(WorkItem::from)
            .collect(),
    };

    let options = RunOptions::new()
        .with_dry_run(dry_run)
        .with_pacing(config.pacing);
    let outcomes = backend
        .engine(config)
        .run(items, &RunMode::Reconcile { delete_orphans }, &options)
        .await;
    let report =
        ReportBuilder::new(ReportKind::Reconciliation, &output_dir).build(outcomes, Utc::now());

    console::print_report(
        ReportKind::Reconciliation,
        &report,
        backend.session.subscription_id(),
        dry_run,
        &console::rerun_flags(args),
    );
    if delete_orphans && !dry_run {
        backend.persist()?;
    }
    Ok(())
}

async fn inventory(config: &LicsyncConfig, args: &ArgMatches) -> anyhow::Result<()> {
    let output_dir = prepare_output_dir(args)?;
    let filter = args
        .get_one::<String>("resource-group")
        .map_or_else(ServerFilter::all, |rg| ServerFilter::resource_group(rg.as_str()));
    let backend = Backend::connect(args, config).await?;

    let records = backend
        .inventory
        .list_servers(&backend.session, &filter)
        .await
        .map_err(LicsyncError::from)?;
    let path = write_inventory(&output_dir, &records, &config.property_keys, Utc::now())
        .map_err(LicsyncError::from)
        .context("writing inventory file")?;

    println!();
    println!("Server records found: {}", records.len());
    println!("Inventory: {}", path.display());
    Ok(())
}
