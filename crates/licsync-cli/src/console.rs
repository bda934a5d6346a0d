//! Console summary

use clap::ArgMatches;
use licsync_core::{LicenseType, Report, ReportKind, RunSummary};
use std::path::{Path, PathBuf};

/// Summary lines for a finished run
#[must_use]
pub fn summary_lines(kind: ReportKind, summary: &RunSummary, dry_run: bool) -> Vec<String> {
    let mut lines = vec![format!("Total records: {}", summary.total)];
    match kind {
        ReportKind::Conversion => {
            lines.push(format!("  Succeeded: {}", summary.succeeded));
            lines.push(format!("  Failed:    {}", summary.failed));
            lines.push(format!("  Skipped:   {}", summary.skipped));
        }
        ReportKind::Reconciliation => {
            lines.push(format!("  Valid:          {}", summary.valid));
            lines.push(format!("  Orphaned:       {}", summary.orphaned));
            lines.push(format!("  Error checking: {}", summary.error_checking));
            lines.push(format!("  Failed:         {}", summary.failed));
            if dry_run {
                lines.push(format!("  Would delete:   {}", summary.would_delete));
            } else if summary.deleted + summary.delete_failed > 0 {
                lines.push(format!("  Deleted:        {}", summary.deleted));
                lines.push(format!("  Delete failed:  {}", summary.delete_failed));
            }
        }
        ReportKind::Inventory => {}
    }
    if dry_run {
        lines.push("Dry run: no changes were made.".to_string());
    }
    lines
}

/// Flags of the current run that a retry must repeat
///
/// `--input` and `--retry-from` are left out; the retry command names the
/// new report instead.
#[must_use]
pub fn rerun_flags(args: &ArgMatches) -> Vec<String> {
    fn value<'a, T: Clone + Send + Sync + 'static>(args: &'a ArgMatches, id: &str) -> Option<&'a T> {
        args.try_get_one::<T>(id).ok().flatten()
    }
    let flag = |id: &str| value::<bool>(args, id).copied().unwrap_or(false);

    let mut flags = Vec::new();
    for id in ["config", "snapshot"] {
        if let Some(path) = value::<PathBuf>(args, id) {
            flags.push(format!("--{id} \"{}\"", path.display()));
        }
    }
    if let Some(workers) = value::<usize>(args, "workers") {
        flags.push(format!("--workers {workers}"));
    }
    if let Some(delay_ms) = value::<u64>(args, "delay-ms") {
        flags.push(format!("--delay-ms {delay_ms}"));
    }
    if let Some(license) = value::<LicenseType>(args, "target-license") {
        flags.push(format!("--target-license {license}"));
    }
    if let Some(rg) = value::<String>(args, "resource-group") {
        flags.push(format!("--resource-group {rg}"));
    }
    for id in ["enable-physical-core-license", "delete-orphans", "dry-run"] {
        if flag(id) {
            flags.push(format!("--{id}"));
        }
    }
    if let Some(dir) = value::<PathBuf>(args, "output-dir").filter(|d| d.as_path() != Path::new(".")) {
        flags.push(format!("--output-dir \"{}\"", dir.display()));
    }
    flags
}

/// Command that re-runs only the records that did not complete
#[must_use]
pub fn retry_command(kind: ReportKind, subscription: &str, report: &Path, flags: &[String]) -> String {
    let command = match kind {
        ReportKind::Reconciliation => "reconcile",
        ReportKind::Conversion | ReportKind::Inventory => "convert",
    };
    let mut line = format!(
        "licsync {command} --subscription {subscription} --retry-from \"{}\"",
        report.display()
    );
    for flag in flags {
        line.push(' ');
        line.push_str(flag);
    }
    line
}

/// Print the run summary, report location and next steps
pub fn print_report(
    kind: ReportKind,
    report: &Report,
    subscription: &str,
    dry_run: bool,
    flags: &[String],
) {
    println!();
    println!("{kind} summary");
    for line in summary_lines(kind, &report.summary, dry_run) {
        println!("{line}");
    }
    println!();

    match &report.artifact {
        Ok(path) => {
            println!("Report: {}", path.display());
            if report.summary.has_failures() {
                println!("Some records did not complete. To retry them:");
                println!("  {}", retry_command(kind, subscription, path, flags));
            }
        }
        Err(e) => {
            println!("Report could not be written: {e}");
            println!(
                "The counts above are complete. Re-run with --output-dir pointing at a writable directory to export the report."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_lines_show_the_three_buckets() {
        let summary = RunSummary {
            total: 3,
            succeeded: 1,
            failed: 1,
            skipped: 1,
            ..RunSummary::default()
        };
        let lines = summary_lines(ReportKind::Conversion, &summary, false);
        assert_eq!(lines[0], "Total records: 3");
        assert!(lines.iter().any(|l| l.contains("Skipped:   1")));
    }

    #[test]
    fn reconcile_dry_run_shows_would_delete() {
        let summary = RunSummary {
            total: 2,
            orphaned: 2,
            would_delete: 2,
            ..RunSummary::default()
        };
        let lines = summary_lines(ReportKind::Reconciliation, &summary, true);
        assert!(lines.iter().any(|l| l.contains("Would delete:   2")));
        assert_eq!(lines.last().unwrap(), "Dry run: no changes were made.");
    }

    #[test]
    fn conversion_retry_repeats_the_run_flags() {
        let matches = crate::cli::build_cli()
            .try_get_matches_from([
                "licsync",
                "convert",
                "--subscription",
                "sub-1",
                "--input",
                "servers.csv",
                "--enable-physical-core-license",
                "--snapshot",
                "inv.json",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();

        let cmd = retry_command(
            ReportKind::Conversion,
            "sub-1",
            Path::new("out/LicenseConversion_20240101_000000.csv"),
            &rerun_flags(args),
        );
        assert_eq!(
            cmd,
            "licsync convert --subscription sub-1 --retry-from \"out/LicenseConversion_20240101_000000.csv\" \
             --snapshot \"inv.json\" --target-license PAYG --enable-physical-core-license"
        );
    }

    #[test]
    fn reconcile_retry_keeps_deleting() {
        let matches = crate::cli::build_cli()
            .try_get_matches_from([
                "licsync",
                "reconcile",
                "--subscription",
                "sub",
                "--delete-orphans",
                "--resource-group",
                "rg-sql",
                "--workers",
                "4",
                "--output-dir",
                "reports",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();

        let cmd = retry_command(
            ReportKind::Reconciliation,
            "sub",
            Path::new("r.csv"),
            &rerun_flags(args),
        );
        assert_eq!(
            cmd,
            "licsync reconcile --subscription sub --retry-from \"r.csv\" --workers 4 \
             --resource-group rg-sql --delete-orphans --output-dir \"reports\""
        );
    }
}
