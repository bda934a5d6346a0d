//! Error types for licsync
//!
//! Errors fall into four groups:
//! - Setup errors ([`LicsyncError`]) abort a run before any record is touched
//! - Per-record collaborator errors ([`InventoryError`]) are captured into
//!   that record's outcome and never abort the run
//! - Reference parse errors ([`ReferenceError`]) make host verification
//!   inconclusive
//! - Export errors ([`ReportError`]) are recovered by the serializer chain

use std::path::PathBuf;

/// Result alias for setup-level operations
pub type LicsyncResult<T> = Result<T, LicsyncError>;

/// Errors raised by the inventory or host-registry collaborators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    /// Resource does not exist (or no longer exists)
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Credential was rejected
    #[error("authentication rejected: {0}")]
    Unauthorized(String),

    /// Credential lacks permission for the operation
    #[error("authorization denied: {0}")]
    Forbidden(String),

    /// Service asked the caller to slow down
    #[error("request throttled: {0}")]
    Throttled(String),

    /// Temporary service-side fault
    #[error("transient service fault: {0}")]
    Transient(String),

    /// Structured API error with optional nested detail
    #[error("API error {status} ({code}): {message}{}", render_inner(.inner))]
    Api {
        status: u16,
        code: String,
        message: String,
        inner: Option<String>,
    },

    /// Request never produced a response
    #[error("transport failure: {0}")]
    Transport(String),

    /// Response could not be decoded into the expected shape
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl InventoryError {
    /// Check if this is a clean "not found" signal
    ///
    /// Only this variant may ever lead to an orphan classification.
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if re-running the record later may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Throttled(_) | Self::Transient(_) | Self::Transport(_)
        )
    }

    /// Check if the credential itself is the problem
    #[inline]
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::Forbidden(_))
    }
}

fn render_inner(inner: &Option<String>) -> String {
    inner
        .as_deref()
        .map(|detail| format!(" (inner: {detail})"))
        .unwrap_or_default()
}

/// Host reference could not be turned into a typed [`HostReference`](crate::reference::HostReference)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    /// Reference is null, empty or whitespace
    #[error("host reference is empty")]
    Empty,

    /// Reference does not match a known identifier layout
    #[error("malformed host reference '{reference}': {reason}")]
    Malformed {
        reference: String,
        reason: &'static str,
    },
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`LicsyncConfig`](crate::config::LicsyncConfig)
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Values parsed but are unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Report export and re-import errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Filesystem failure
    #[error("report I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Structured CSV writer/reader failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Row could not be converted back into an outcome
    #[error("invalid report row {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    /// Every serializer in the chain failed
    #[error("all report serializers failed: {}", render_attempts(.attempts))]
    AllStrategiesFailed {
        /// `(strategy name, error text)` in chain order
        attempts: Vec<(String, String)>,
    },
}

fn render_attempts(attempts: &[(String, String)]) -> String {
    attempts
        .iter()
        .map(|(name, error)| format!("{name}: {error}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Setup-level failures; these abort a run with a non-zero exit
#[derive(Debug, thiserror::Error)]
pub enum LicsyncError {
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session could not be established
    #[error("session error: {0}")]
    Session(String),

    /// Input file missing or unreadable
    #[error("cannot read input {path}: {reason}")]
    Input { path: PathBuf, reason: String },

    /// Input file lacks required columns
    #[error("input {path} is missing required columns: {}", .columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    /// Output directory missing and could not be created
    #[error("output directory {path} is unusable: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listing the inventory failed before processing began
    #[error("inventory listing failed: {0}")]
    Inventory(#[from] InventoryError),

    /// Previous report could not be re-imported
    #[error("cannot load report: {0}")]
    Report(#[from] ReportError),
}

impl LicsyncError {
    /// Actionable next step for the operator
    #[must_use]
    pub fn suggested_fix(&self) -> String {
        match self {
            Self::Config(_) => {
                "Check the --config file against the documented keys, or omit --config to use defaults."
                    .to_string()
            }
            Self::Session(_) => {
                "Sign in again and export a fresh token in LICSYNC_ACCESS_TOKEN, then re-run."
                    .to_string()
            }
            Self::Input { path, .. } => format!(
                "Verify that {} exists and is a readable CSV file.",
                path.display()
            ),
            Self::MissingColumns { path, columns } => format!(
                "Add the columns [{}] to the header row of {}.",
                columns.join(", "),
                path.display()
            ),
            Self::OutputDirectory { path, .. } => format!(
                "Create {} or pass a writable directory via --output-dir.",
                path.display()
            ),
            Self::Inventory(e) if e.is_auth_failure() => {
                "Confirm the signed-in identity has read access to the subscription.".to_string()
            }
            Self::Inventory(_) => {
                "Check connectivity to the inventory endpoint and re-run the command.".to_string()
            }
            Self::Report(_) => {
                "Pass a report file produced by a previous licsync run to --retry-from.".to_string()
            }
        }
    }
}
