//! Input CSV loading and retry selection

use licsync_core::{
    InputRecord, LicsyncError, LicsyncResult, OrphanAction, OutcomeStatus, ProcessingOutcome,
};
use std::path::Path;

/// Columns every input file must carry (matched case-insensitively)
pub const REQUIRED_COLUMNS: [&str; 3] = ["ServerName", "ResourceGroup", "MachineName"];

/// Load an input file
///
/// Optional columns: `Location`. A `LicenseType` column is accepted and
/// ignored; the current mode is always read from the inventory.
///
/// # Errors
/// - [`LicsyncError::Input`] if the file is missing or not valid CSV
/// - [`LicsyncError::MissingColumns`] if a required column is absent
pub fn load_input(path: &Path) -> LicsyncResult<Vec<InputRecord>> {
    let input_error = |reason: String| LicsyncError::Input {
        path: path.to_path_buf(),
        reason,
    };
    if !path.is_file() {
        return Err(input_error("file not found".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| input_error(e.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|e| input_error(e.to_string()))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| column(name).is_none())
        .map(|name| (*name).to_string())
        .collect();
    let (Some(server), Some(group), Some(machine)) = (
        column("ServerName"),
        column("ResourceGroup"),
        column("MachineName"),
    ) else {
        return Err(LicsyncError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        });
    };
    let location = column("Location");

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| input_error(format!("line {}: {e}", index + 2)))?;
        let field = |i: usize| row.get(i).filter(|s| !s.is_empty()).map(str::to_string);

        if row.iter().all(str::is_empty) {
            continue;
        }

        let mut record = InputRecord::new(
            field(group).unwrap_or_default(),
            field(server).unwrap_or_default(),
        );
        record.machine = field(machine);
        record.location = location.and_then(field);
        records.push(record);
    }

    tracing::info!(path = %path.display(), records = records.len(), "Loaded input");
    Ok(records)
}

fn needs_retry(outcome: &ProcessingOutcome) -> bool {
    matches!(
        outcome.status,
        OutcomeStatus::Failed | OutcomeStatus::ErrorChecking
    ) || outcome.action == Some(OrphanAction::FailedToDelete)
}

/// Records from a previous report that did not complete
#[must_use]
pub fn retry_candidates(outcomes: &[ProcessingOutcome]) -> Vec<InputRecord> {
    outcomes
        .iter()
        .filter(|o| needs_retry(o))
        .map(|o| InputRecord {
            locator: licsync_core::ServerLocator::new(
                &o.identity.resource_group,
                &o.identity.name,
            ),
            machine: o.identity.machine.clone(),
            location: o.identity.location.clone(),
        })
        .collect()
}

/// Keep only inputs named in `retry`, preserving input order
#[must_use]
pub fn restrict_to(inputs: Vec<InputRecord>, retry: &[InputRecord]) -> Vec<InputRecord> {
    inputs
        .into_iter()
        .filter(|input| {
            retry.iter().any(|r| {
                r.locator.name.eq_ignore_ascii_case(&input.locator.name)
                    && r.locator
                        .resource_group
                        .eq_ignore_ascii_case(&input.locator.resource_group)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use licsync_core::RecordIdentity;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn headers_match_case_insensitively() {
        let file = write_csv(
            "servername,RESOURCEGROUP,MachineName,Location,LicenseType\n\
             sql01, rg-a ,HOST01,westeurope,Paid\n\
             sql02,rg-a,,,\n",
        );
        let records = load_input(file.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].locator.resource_group, "rg-a");
        assert_eq!(records[0].machine.as_deref(), Some("HOST01"));
        assert_eq!(records[0].location.as_deref(), Some("westeurope"));
        assert_eq!(records[1].machine, None);
    }

    #[test]
    fn missing_columns_are_listed() {
        let file = write_csv("ServerName,Location\nsql01,westeurope\n");
        match load_input(file.path()) {
            Err(LicsyncError::MissingColumns { columns, .. }) => {
                assert_eq!(columns, ["ResourceGroup", "MachineName"]);
            }
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = load_input(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, LicsyncError::Input { .. }));
        assert!(err.suggested_fix().contains("/definitely/not/here.csv"));
    }

    #[test]
    fn retry_picks_failures_and_restricts_inputs() {
        let now = Utc::now();
        let outcomes = vec![
            ProcessingOutcome::new(RecordIdentity::new("a", "rg"), OutcomeStatus::Success, now),
            ProcessingOutcome::failed(RecordIdentity::new("b", "rg"), "boom", now),
            ProcessingOutcome::new(
                RecordIdentity::new("c", "rg"),
                OutcomeStatus::OrphanedNoReference,
                now,
            )
            .with_action(OrphanAction::FailedToDelete),
        ];
        let retry = retry_candidates(&outcomes);
        let names: Vec<&str> = retry.iter().map(|r| r.locator.name.as_str()).collect();
        assert_eq!(names, ["b", "c"]);

        let inputs = vec![
            InputRecord::new("rg", "a"),
            InputRecord::new("RG", "B"),
            InputRecord::new("rg", "d"),
        ];
        let kept = restrict_to(inputs, &retry);
        assert_eq!(kept, vec![InputRecord::new("RG", "B")]);
    }
}
