//! Error types for the TMDB wrangling pipeline.
//!
//! - [`MalformedInputError`] - unreadable file, ragged rows, bad field values
//! - [`SchemaError`] - expected column missing or of the wrong kind
//! - [`InvariantViolationError`] - a stage received data its predecessor promised to exclude
//! - [`ConfigError`] - invalid pipeline options
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across stage boundaries.

use thiserror::Error;

// =============================================================================
// Malformed Input
// =============================================================================

/// The input file could not be turned into a rectangular, typed table.
///
/// `line` is 1-based and counts the header as line 1; `0` means the error is
/// not tied to a particular line (e.g. the file could not be read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedInputError {
    pub line: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for MalformedInputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => {
                write!(f, "Line {}, column '{}': {}", self.line, col, self.message)
            }
            _ => {
                write!(f, "Line {}: {}", self.line, self.message)
            }
        }
    }
}

impl std::error::Error for MalformedInputError {}

impl MalformedInputError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

// =============================================================================
// Schema Errors
// =============================================================================

/// A column the pipeline relies on is absent, duplicated or of the wrong kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// Expected column is not in the table.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// The header names the same column twice.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Column exists but holds the wrong kind of data.
    #[error("Column '{column}' is {actual}, expected {expected}")]
    WrongKind {
        column: String,
        expected: String,
        actual: String,
    },

    /// The cleaning configuration would remove a column later stages need.
    #[error("Column '{0}' is required by the pipeline and cannot be dropped")]
    RequiredColumnDropped(String),

    /// A derived column would overwrite an existing one.
    #[error("Column already exists: {0}")]
    ColumnExists(String),
}

// =============================================================================
// Invariant Violations
// =============================================================================

/// A stage found data that an earlier stage guarantees cannot exist.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invariant violated in {stage} (column '{column}', row {row}): {message}")]
pub struct InvariantViolationError {
    pub stage: &'static str,
    pub column: String,
    pub row: usize,
    pub message: String,
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in user-supplied pipeline options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Bin edges are not strictly increasing or do not match the labels.
    #[error("Invalid bins for '{name}': {message}")]
    InvalidBins { name: String, message: String },

    /// Explode settings are unusable.
    #[error("Invalid explode spec for '{source_column}': {message}")]
    InvalidExplode {
        source_column: String,
        message: String,
    },

    /// Options file could not be read.
    #[error("Failed to read options: {0}")]
    Io(#[from] std::io::Error),

    /// Options file is not valid JSON for [`crate::options::PipelineOptions`].
    #[error("Invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline error.
///
/// This is the error type returned by [`crate::transform::pipeline::run_path`].
/// Any error aborts the run: there is no partially cleaned output.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input could not be parsed.
    #[error("Malformed input: {0}")]
    MalformedInput(#[from] MalformedInputError),

    /// Schema mismatch.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Internal guarantee broken.
    #[error("{0}")]
    InvariantViolation(#[from] InvariantViolationError),

    /// Invalid options.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Writing CSV output failed.
    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    /// File system error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataframe operation failed.
    #[error("Dataframe error: {0}")]
    Frame(#[from] polars::error::PolarsError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for schema lookups.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for option handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // SchemaError -> PipelineError
        let schema_err = SchemaError::MissingColumn("revenue".into());
        let pipeline_err: PipelineError = schema_err.into();
        assert!(pipeline_err.to_string().contains("revenue"));

        // MalformedInputError -> PipelineError
        let input_err = MalformedInputError::new(3, "unequal lengths");
        let pipeline_err: PipelineError = input_err.into();
        assert!(pipeline_err.to_string().contains("Line 3"));
    }

    #[test]
    fn test_malformed_input_format() {
        let err = MalformedInputError::new(5, "not a number")
            .with_column("budget")
            .with_value("abc");

        let msg = err.to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("column 'budget'"));
        assert!(msg.contains("value 'abc'"));
    }

    #[test]
    fn test_invariant_violation_format() {
        let err = InvariantViolationError {
            stage: "explode",
            column: "genres".into(),
            row: 7,
            message: "null value".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("explode"));
        assert!(msg.contains("genres"));
        assert!(msg.contains("row 7"));
    }

    #[test]
    fn test_wrong_kind_format() {
        let err = SchemaError::WrongKind {
            column: "original_title".into(),
            expected: "numeric".into(),
            actual: "text".into(),
        };
        assert_eq!(err.to_string(), "Column 'original_title' is text, expected numeric");
    }
}
