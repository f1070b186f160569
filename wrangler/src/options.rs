//! Pipeline options.
//!
//! Every knob of the pipeline lives in [`PipelineOptions`]. The defaults
//! reproduce the standard TMDB wrangling run; a JSON file can override any
//! subset of fields.
//!
//! ```json
//! {
//!   "date_policy": "fail",
//!   "tie_break": "lexicographic",
//!   "top_k_per_group": 5
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::models::columns;
use crate::stats::TieBreak;
use crate::transform::derive::Bins;
use crate::transform::explode::ExplodeSpec;

/// What the loader does with a release date it cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// Null that row's day and month; the cleaner then drops the row.
    #[default]
    NullFields,
    /// Abort the load with a malformed-input error.
    Fail,
}

/// Options for the wrangling pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Field delimiter of the input file (auto-detect if not specified)
    pub delimiter: Option<char>,

    /// Handling of unparseable release dates
    pub date_policy: DatePolicy,

    /// Low-information columns removed by the cleaner
    pub drop_columns: Vec<String>,

    /// Revenue tiers
    pub revenue_bins: Bins,

    /// Label given to rows whose revenue falls in no tier
    pub revenue_backfill: String,

    /// Release-year decades (no backfill)
    pub decade_bins: Bins,

    /// Multi-valued columns to explode, one view each
    pub explode: Vec<ExplodeSpec>,

    /// Ordering of equal counts in frequency rankings
    pub tie_break: TieBreak,

    /// Values kept per group in grouped rankings
    pub top_k_per_group: usize,

    /// Cast members listed in the analysis report
    pub top_cast: usize,

    /// Directors listed in the analysis report
    pub top_directors: usize,

    /// Movies listed in the popularity ranking
    pub top_popular: usize,

    /// Run the explosions on scoped threads
    pub parallel_explode: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            date_policy: DatePolicy::NullFields,
            drop_columns: default_drop_columns(),
            revenue_bins: Bins::revenue_tiers(),
            revenue_backfill: "under_million".to_string(),
            decade_bins: Bins::decades(),
            explode: vec![
                ExplodeSpec::new(columns::GENRES, "genre"),
                ExplodeSpec::new(columns::CAST, "cast_member"),
                ExplodeSpec::new(columns::DIRECTOR, "director_name"),
            ],
            tie_break: TieBreak::FirstSeen,
            top_k_per_group: 3,
            top_cast: 20,
            top_directors: 20,
            top_popular: 10,
            parallel_explode: false,
        }
    }
}

/// Columns of the TMDB export that carry no value for the analysis.
pub fn default_drop_columns() -> Vec<String> {
    [
        columns::IMDB_ID,
        columns::HOMEPAGE,
        columns::TAGLINE,
        columns::OVERVIEW,
        columns::RUNTIME,
        columns::BUDGET_ADJ,
        columns::REVENUE_ADJ,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl PipelineOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Read options from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check bins and explode specs.
    pub fn validate(&self) -> ConfigResult<()> {
        self.revenue_bins.validate("revenue_bins")?;
        self.decade_bins.validate("decade_bins")?;

        for spec in &self.explode {
            if spec.delimiter.is_empty() {
                return Err(ConfigError::InvalidExplode {
                    source_column: spec.source.clone(),
                    message: "delimiter must not be empty".to_string(),
                });
            }
            if spec.target.is_empty() || spec.target == spec.source {
                return Err(ConfigError::InvalidExplode {
                    source_column: spec.source.clone(),
                    message: format!("target column '{}' must be a new, non-empty name", spec.target),
                });
            }
        }
        Ok(())
    }
}
