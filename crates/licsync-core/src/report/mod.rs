//! Report building
//!
//! Folds outcomes into a [`RunSummary`] and writes a tabular artifact
//! through an ordered chain of [`ReportSerializer`]s. The first strategy
//! that succeeds wins; when all fail the outcomes and summary are still
//! returned and only the file is lost.

pub mod serializer;

pub use serializer::{
    default_chain, CsvWriterSerializer, DelimitedTextSerializer, JsonLinesSerializer,
    ReportSerializer,
};

use crate::error::ReportError;
use crate::model::{LicenseConfiguration, LicenseType, PhysicalCoreLicense};
use crate::outcome::{ProcessingOutcome, RecordIdentity, RunSummary};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Column order of every tabular report
pub const REPORT_COLUMNS: &[&str] = &[
    "ServerName",
    "ResourceGroup",
    "MachineName",
    "Location",
    "PreviousLicenseType",
    "PreviousPhysicalCoreApplied",
    "PreviousPhysicalCoreUpdated",
    "TargetLicenseType",
    "TargetPhysicalCoreApplied",
    "TargetPhysicalCoreUpdated",
    "AppliedLicenseType",
    "AppliedPhysicalCoreApplied",
    "AppliedPhysicalCoreUpdated",
    "Status",
    "Action",
    "Message",
    "Timestamp",
];

/// Which run produced a report; selects the file prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// License conversion run
    Conversion,
    /// Orphan reconciliation run
    Reconciliation,
    /// Server discovery listing
    Inventory,
}

impl ReportKind {
    /// File name prefix
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Conversion => "LicenseConversion",
            Self::Reconciliation => "OrphanReconciliation",
            Self::Inventory => "ServerInventory",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// `<prefix>_<YYYYMMDD_HHMMSS>.<extension>`
#[must_use]
pub fn artifact_file_name(kind: ReportKind, now: DateTime<Utc>, extension: &str) -> String {
    format!("{}_{}.{extension}", kind.prefix(), now.format("%Y%m%d_%H%M%S"))
}

/// One flat report row; every column is text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportRow {
    pub server_name: String,
    pub resource_group: String,
    pub machine_name: String,
    pub location: String,
    pub previous_license_type: String,
    pub previous_physical_core_applied: String,
    pub previous_physical_core_updated: String,
    pub target_license_type: String,
    pub target_physical_core_applied: String,
    pub target_physical_core_updated: String,
    pub applied_license_type: String,
    pub applied_physical_core_applied: String,
    pub applied_physical_core_updated: String,
    pub status: String,
    pub action: String,
    pub message: String,
    pub timestamp: String,
}

impl ReportRow {
    /// Values in [`REPORT_COLUMNS`] order
    #[must_use]
    pub fn values(&self) -> [&str; 17] {
        [
            &self.server_name,
            &self.resource_group,
            &self.machine_name,
            &self.location,
            &self.previous_license_type,
            &self.previous_physical_core_applied,
            &self.previous_physical_core_updated,
            &self.target_license_type,
            &self.target_physical_core_applied,
            &self.target_physical_core_updated,
            &self.applied_license_type,
            &self.applied_physical_core_applied,
            &self.applied_physical_core_updated,
            &self.status,
            &self.action,
            &self.message,
            &self.timestamp,
        ]
    }

    /// Convert back into an outcome; `line` is used in error messages
    ///
    /// # Errors
    /// Returns [`ReportError::InvalidRow`] if a status, action, license
    /// type, flag or timestamp does not parse
    pub fn into_outcome(self, line: usize) -> Result<ProcessingOutcome, ReportError> {
        let invalid = |reason: String| ReportError::InvalidRow { line, reason };

        let previous = decode_configuration(
            &self.previous_license_type,
            &self.previous_physical_core_applied,
            &self.previous_physical_core_updated,
        )
        .map_err(invalid)?;
        let target = decode_configuration(
            &self.target_license_type,
            &self.target_physical_core_applied,
            &self.target_physical_core_updated,
        )
        .map_err(invalid)?;
        let applied = decode_configuration(
            &self.applied_license_type,
            &self.applied_physical_core_applied,
            &self.applied_physical_core_updated,
        )
        .map_err(invalid)?;

        let status = self.status.parse().map_err(invalid)?;
        let action = non_empty(self.action)
            .map(|a| a.parse())
            .transpose()
            .map_err(invalid)?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| invalid(format!("bad timestamp '{}': {e}", self.timestamp)))?
            .with_timezone(&Utc);

        Ok(ProcessingOutcome {
            identity: RecordIdentity {
                name: self.server_name,
                resource_group: self.resource_group,
                machine: non_empty(self.machine_name),
                location: non_empty(self.location),
            },
            previous,
            target,
            applied,
            status,
            action,
            message: non_empty(self.message),
            timestamp,
        })
    }
}

impl From<&ProcessingOutcome> for ReportRow {
    fn from(outcome: &ProcessingOutcome) -> Self {
        let (previous_license_type, previous_physical_core_applied, previous_physical_core_updated) =
            encode_configuration(outcome.previous.as_ref());
        let (target_license_type, target_physical_core_applied, target_physical_core_updated) =
            encode_configuration(outcome.target.as_ref());
        let (applied_license_type, applied_physical_core_applied, applied_physical_core_updated) =
            encode_configuration(outcome.applied.as_ref());

        Self {
            server_name: outcome.identity.name.clone(),
            resource_group: outcome.identity.resource_group.clone(),
            machine_name: outcome.identity.machine.clone().unwrap_or_default(),
            location: outcome.identity.location.clone().unwrap_or_default(),
            previous_license_type,
            previous_physical_core_applied,
            previous_physical_core_updated,
            target_license_type,
            target_physical_core_applied,
            target_physical_core_updated,
            applied_license_type,
            applied_physical_core_applied,
            applied_physical_core_updated,
            status: outcome.status.as_str().to_string(),
            action: outcome
                .action
                .map(|a| a.as_str().to_string())
                .unwrap_or_default(),
            message: outcome.message.clone().unwrap_or_default(),
            timestamp: outcome
                .timestamp
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

// An absent configuration is three empty cells; a present one always has a license type.
fn encode_configuration(config: Option<&LicenseConfiguration>) -> (String, String, String) {
    let Some(config) = config else {
        return (String::new(), String::new(), String::new());
    };
    let (applied, updated) = match &config.physical_core {
        Some(core) => (
            core.is_applied.to_string(),
            core.last_updated.clone().unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    };
    (config.license_type.as_str().to_string(), applied, updated)
}

fn decode_configuration(
    license_type: &str,
    applied: &str,
    updated: &str,
) -> Result<Option<LicenseConfiguration>, String> {
    if license_type.is_empty() {
        return Ok(None);
    }
    let license_type = if license_type.eq_ignore_ascii_case(LicenseType::Unknown.as_str()) {
        LicenseType::Unknown
    } else {
        license_type.parse()?
    };
    let physical_core = if applied.is_empty() {
        None
    } else {
        let is_applied = applied
            .parse::<bool>()
            .map_err(|_| format!("bad physical-core flag '{applied}'"))?;
        Some(PhysicalCoreLicense {
            is_applied,
            last_updated: (!updated.is_empty()).then(|| updated.to_string()),
        })
    };
    Ok(Some(LicenseConfiguration::new(license_type, physical_core)))
}

/// Result of building a report
#[derive(Debug)]
pub struct Report {
    /// Counters over all outcomes
    pub summary: RunSummary,
    /// Outcomes in input order
    pub outcomes: Vec<ProcessingOutcome>,
    /// Written file, or the chain's combined error
    pub artifact: Result<PathBuf, ReportError>,
}

/// Writes outcomes through the serializer chain
pub struct ReportBuilder {
    kind: ReportKind,
    output_dir: PathBuf,
    chain: Vec<Box<dyn ReportSerializer>>,
}

impl fmt::Debug for ReportBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.chain.iter().map(|s| s.name()).collect();
        f.debug_struct("ReportBuilder")
            .field("kind", &self.kind)
            .field("output_dir", &self.output_dir)
            .field("chain", &names)
            .finish()
    }
}

impl ReportBuilder {
    /// Create builder with the default chain
    #[must_use]
    pub fn new(kind: ReportKind, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            output_dir: output_dir.into(),
            chain: default_chain(),
        }
    }

    /// Replace the serializer chain
    #[must_use]
    pub fn with_chain(mut self, chain: Vec<Box<dyn ReportSerializer>>) -> Self {
        self.chain = chain;
        self
    }

    /// Summarize outcomes and write the artifact
    #[must_use]
    pub fn build(&self, outcomes: Vec<ProcessingOutcome>, now: DateTime<Utc>) -> Report {
        let summary = RunSummary::from_outcomes(&outcomes);
        let rows: Vec<ReportRow> = outcomes.iter().map(ReportRow::from).collect();
        let artifact = self.write(&rows, now);
        Report {
            summary,
            outcomes,
            artifact,
        }
    }

    fn write(&self, rows: &[ReportRow], now: DateTime<Utc>) -> Result<PathBuf, ReportError> {
        let mut attempts = Vec::with_capacity(self.chain.len());

        for serializer in &self.chain {
            let path = self
                .output_dir
                .join(artifact_file_name(self.kind, now, serializer.extension()));
            let result = serializer
                .render(rows)
                .and_then(|bytes| std::fs::write(&path, bytes).map_err(ReportError::from));

            match result {
                Ok(()) => {
                    tracing::info!(strategy = serializer.name(), path = %path.display(), rows = rows.len(), "Report written");
                    return Ok(path);
                }
                Err(e) => {
                    tracing::warn!(strategy = serializer.name(), error = %e, "Report strategy failed, trying next");
                    attempts.push((serializer.name().to_string(), e.to_string()));
                }
            }
        }

        tracing::error!(attempts = attempts.len(), "Every report strategy failed");
        Err(ReportError::AllStrategiesFailed { attempts })
    }
}

/// Re-import a report written by [`ReportBuilder`]
///
/// `.jsonl` files are read as JSON lines; anything else as CSV with a
/// header row.
///
/// # Errors
/// Returns [`ReportError`] if the file cannot be read or a row is invalid
pub fn read_report(path: impl AsRef<Path>) -> Result<Vec<ProcessingOutcome>, ReportError> {
    let path = path.as_ref();
    let is_json_lines = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));

    if is_json_lines {
        let text = std::fs::read_to_string(path)?;
        return text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                let row: ReportRow = serde_json::from_str(line)?;
                row.into_outcome(index + 1)
            })
            .collect();
    }

    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize::<ReportRow>()
        .enumerate()
        .map(|(index, row)| row?.into_outcome(index + 2))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{OrphanAction, OutcomeStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn file_name_uses_prefix_and_stamp() {
        assert_eq!(
            artifact_file_name(ReportKind::Conversion, now(), "csv"),
            "LicenseConversion_20240309_070501.csv"
        );
        assert_eq!(
            artifact_file_name(ReportKind::Reconciliation, now(), "jsonl"),
            "OrphanReconciliation_20240309_070501.jsonl"
        );
    }

    #[test]
    fn row_keeps_absent_and_present_configurations_apart() {
        let outcome = ProcessingOutcome::new(
            RecordIdentity::new("sql01", "rg"),
            OutcomeStatus::OrphanedNoReference,
            now(),
        )
        .with_previous(LicenseConfiguration::new(LicenseType::Unknown, None))
        .with_action(OrphanAction::WouldDelete);

        let row = ReportRow::from(&outcome);
        assert_eq!(row.previous_license_type, "Unknown");
        assert_eq!(row.target_license_type, "");
        assert_eq!(row.action, "Would Delete");

        assert_eq!(row.into_outcome(2).unwrap(), outcome);
    }

    #[test]
    fn bad_status_names_the_line() {
        let row = ReportRow {
            status: "Exploded".into(),
            timestamp: "2024-03-09T07:05:01Z".into(),
            ..ReportRow::default()
        };
        let err = row.into_outcome(7).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRow { line: 7, .. }));
    }

    #[test]
    fn columns_match_row_values() {
        assert_eq!(REPORT_COLUMNS.len(), ReportRow::default().values().len());
    }
}
