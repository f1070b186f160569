//! # TMDB Wrangler - cleaning and exploratory analysis of the TMDB movie export
//!
//! Loads the TMDB movies CSV, removes unusable rows, derives financial and
//! period columns, explodes the multi-valued columns and answers the usual
//! exploratory questions (genres per decade, revenue drivers, top cast...).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ CSV File │──▶│  Loader  │──▶│ Cleaner  │──▶│  Derive  │──▶│ Explode  │──▶│  Stats   │
//! │(any enc.)│   │(auto-enc)│   │(dedupe)  │   │(profit..)│   │ (x3)     │   │ (report) │
//! └──────────┘   └──────────┘   └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tmdb_wrangler::{analyze, run_path, PipelineOptions};
//!
//! let options = PipelineOptions::default();
//! let output = run_path("tmdb-movies.csv", &options)?;
//! let report = analyze(&output, &options)?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, columns, schema and table
//! - [`parser`] - CSV loading with encoding and delimiter detection
//! - [`validation`] - Schema checks at the loader boundary
//! - [`transform`] - Cleaner, derivation, explosion and pipeline
//! - [`stats`] - Frequencies, rankings, correlations, summaries
//! - [`options`] - Pipeline configuration
//! - [`logs`] - Progress log

// Core modules
pub mod error;
pub mod logs;
pub mod models;
pub mod options;

// Loading
pub mod parser;
pub mod validation;

// Transformation
pub mod transform;

// Aggregation
pub mod stats;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, InvariantViolationError, MalformedInputError, PipelineError, PipelineResult, SchemaError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{columns, Cell, ColumnDef, ColumnKind, Row, Schema, Table};

// =============================================================================
// Re-exports - Options
// =============================================================================

pub use options::{DatePolicy, PipelineOptions};

// =============================================================================
// Re-exports - CSV Loading
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, load_bytes, load_path, load_str, parse_release_date,
    LoadedTable,
};

// =============================================================================
// Re-exports - Stages
// =============================================================================

pub use transform::{clean, derive, explode, explode_all, Bins, CleanReport, DeriveReport, ExplodeSpec, ExplodedView};

// =============================================================================
// Re-exports - Stats
// =============================================================================

pub use stats::{
    bivariate, describe, describe_all, grouped_top_k, top_n, value_counts, Bivariate, Frequency, GroupTopK,
    Summary, TieBreak,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    analyze, clean_and_derive, run_bytes, run_loaded, run_path, run_table, AnalysisReport, LoadInfo,
    PipelineOutput,
};
