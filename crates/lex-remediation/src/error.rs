//! Error types for the remediation pipeline.
//!
//! Stage code returns [`RemediationError`]. Some variants are recovered where
//! they happen (a vanished column skips one action, unparseable values become
//! missing, thin data yields an empty anomaly report); only dataset-level
//! structural failures abort a run.
//!
//! Errors serialize as `{code, message}` so they can sit inside JSON reports.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the remediation pipeline.
#[derive(Error, Debug)]
pub enum RemediationError {
    /// The dataset has no rows or no columns.
    #[error("Dataset is empty ({rows} rows x {columns} columns)")]
    DataEmpty { rows: usize, columns: usize },

    /// An action targets a column that is no longer in the dataset.
    #[error("Column '{0}' is no longer present in the dataset")]
    ColumnVanished(String),

    /// Not enough numeric support to run anomaly detection.
    #[error(
        "Insufficient data for anomaly detection: {rows} rows, {numeric_columns} numeric columns (need at least {min_rows} rows and 2 numeric columns)"
    )]
    InsufficientSupport {
        rows: usize,
        numeric_columns: usize,
        min_rows: usize,
    },

    /// Some values could not be coerced to the target type.
    #[error("{count} value(s) in column '{column}' could not be parsed as {target}")]
    UnparseableValue {
        column: String,
        target: String,
        count: usize,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A pipeline stage failed.
    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },

    /// Internal error (e.g., thread join failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RemediationError>,
    },
}

impl RemediationError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RemediationError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DataEmpty { .. } => "DATA_EMPTY",
            Self::ColumnVanished(_) => "COLUMN_VANISHED",
            Self::InsufficientSupport { .. } => "INSUFFICIENT_SUPPORT",
            Self::UnparseableValue { .. } => "UNPARSEABLE_VALUE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::StageFailed { .. } => "STAGE_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the error is handled locally instead of aborting a run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ColumnVanished(_)
            | Self::InsufficientSupport { .. }
            | Self::UnparseableValue { .. } => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

impl Serialize for RemediationError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("RemediationError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for remediation operations.
pub type Result<T> = std::result::Result<T, RemediationError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| RemediationError::Polars(e).with_context(context))
    }
}
