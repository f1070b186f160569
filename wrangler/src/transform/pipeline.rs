//! High-level pipeline API: load, clean, derive, explode, then analyze.
//!
//! Each stage takes the previous stage's table by value and returns a new
//! one, so the whole run is a straight chain of function calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use tmdb_wrangler::{analyze, run_path, PipelineOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = PipelineOptions::default();
//!     let output = run_path("tmdb-movies.csv", &options)?;
//!     let report = analyze(&output, &options)?;
//!
//!     println!("{} movies, {} genre rows", output.table.row_count(), report.genre_rows);
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;

use super::cleaner::{clean, CleanReport};
use super::derive::{derive, DeriveReport};
use super::explode::{explode_all, ExplodedView};
use crate::error::PipelineResult;
use crate::logs::{log_info, log_success};
use crate::models::{columns, Table};
use crate::options::PipelineOptions;
use crate::parser::{load_bytes, load_path, LoadedTable};
use crate::stats::{
    bivariate, describe_all, grouped_top_k, top_n, value_counts, Bivariate, Frequency, GroupTopK, Summary,
};
use crate::validation::check_clean;

/// How the input was read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub unparsed_dates: usize,
}

impl From<&LoadedTable> for LoadInfo {
    fn from(loaded: &LoadedTable) -> Self {
        Self {
            encoding: loaded.encoding.clone(),
            delimiter: loaded.delimiter,
            headers: loaded.headers.clone(),
            row_count: loaded.table.row_count(),
            unparsed_dates: loaded.unparsed_dates,
        }
    }
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    /// Cleaned table with derived columns
    pub table: Table,
    /// One exploded view per configured spec, in configuration order
    pub views: Vec<ExplodedView>,
    pub load_info: LoadInfo,
    pub clean_report: CleanReport,
    pub derive_report: DeriveReport,
}

impl PipelineOutput {
    /// The exploded view of a source column, if it was configured.
    pub fn view(&self, source_column: &str) -> Option<&ExplodedView> {
        self.views.iter().find(|v| v.source_column == source_column)
    }

    pub fn genres(&self) -> Option<&ExplodedView> {
        self.view(columns::GENRES)
    }

    pub fn cast(&self) -> Option<&ExplodedView> {
        self.view(columns::CAST)
    }

    pub fn directors(&self) -> Option<&ExplodedView> {
        self.view(columns::DIRECTOR)
    }
}

/// Run the pipeline on a file.
pub fn run_path(path: impl AsRef<Path>, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    log_info(format!("Input: {}", path.as_ref().display()));
    let loaded = load_path(path, options)?;
    run_loaded(loaded, options)
}

/// Run the pipeline on raw file bytes.
pub fn run_bytes(bytes: &[u8], options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    let loaded = load_bytes(bytes, options)?;
    run_loaded(loaded, options)
}

/// Run the pipeline on a table already in the loaded schema.
pub fn run_table(table: Table, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    let loaded = LoadedTable {
        encoding: "utf-8".to_string(),
        delimiter: options.delimiter.unwrap_or(','),
        headers: table.schema().names().into_iter().map(String::from).collect(),
        unparsed_dates: 0,
        table,
    };
    run_loaded(loaded, options)
}

/// Run the stages after loading.
pub fn run_loaded(loaded: LoadedTable, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    options.validate()?;
    let load_info = LoadInfo::from(&loaded);

    let (table, clean_report) = clean(loaded.table, &options.drop_columns)?;
    let (table, derive_report) = derive(table, options)?;

    log_info("✂️  Exploding multi-valued columns...");
    let views = explode_all(&table, &options.explode, options.parallel_explode)?;

    log_success(format!("Pipeline complete: {} movies", table.row_count()));

    Ok(PipelineOutput {
        table,
        views,
        load_info,
        clean_report,
        derive_report,
    })
}

/// Clean and derive only, without exploding.
pub fn clean_and_derive(loaded: LoadedTable, options: &PipelineOptions) -> PipelineResult<(Table, CleanReport, DeriveReport)> {
    options.validate()?;
    let (table, clean_report) = clean(loaded.table, &options.drop_columns)?;
    let (table, derive_report) = derive(table, options)?;
    Ok((table, clean_report, derive_report))
}

// =============================================================================
// Analysis
// =============================================================================

/// Columns compared against revenue.
pub const REVENUE_COMPARISONS: &[&str] = &[
    columns::BUDGET,
    columns::PROFIT,
    columns::PROFITABILITY_RATIO,
    columns::POPULARITY,
];

/// Answers to the standard exploratory questions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub movies: usize,
    pub genre_rows: usize,
    pub genre_counts: Vec<Frequency>,
    pub top_genres_by_decade: Vec<GroupTopK>,
    pub revenue_rating_counts: Vec<Frequency>,
    /// Revenue against each of [`REVENUE_COMPARISONS`]
    pub revenue_vs: Vec<Bivariate>,
    pub top_cast: Vec<Frequency>,
    pub top_directors: Vec<Frequency>,
    /// `popularity` and `original_title` of the most popular movies
    pub most_popular: Table,
    pub summaries: Vec<Summary>,
    /// Duplicate rows in each exploded view
    pub exploded_duplicates: Vec<(String, usize)>,
}

/// Compute the analysis report of a pipeline run.
///
/// Sections that depend on an exploded view that was not configured are empty.
pub fn analyze(output: &PipelineOutput, options: &PipelineOptions) -> PipelineResult<AnalysisReport> {
    log_info("📊 Analyzing...");
    let table = &output.table;
    check_clean_input(table)?;

    let (genre_rows, genre_counts, top_genres_by_decade) = match output.genres() {
        Some(view) => (
            view.row_count(),
            value_counts(&view.table, &view.target_column, options.tie_break)?,
            grouped_top_k(
                &view.table,
                columns::DECADES,
                &view.target_column,
                options.top_k_per_group,
                options.tie_break,
            )?,
        ),
        None => (0, Vec::new(), Vec::new()),
    };

    let revenue_rating_counts = value_counts(table, columns::REVENUE_RATING, options.tie_break)?;

    let revenue_vs = REVENUE_COMPARISONS
        .iter()
        .map(|other| bivariate(table, columns::REVENUE, other))
        .collect::<Result<Vec<_>, _>>()?;

    let top_cast = top_values(output.cast(), options.top_cast, options)?;
    let top_directors = top_values(output.directors(), options.top_directors, options)?;

    let most_popular = top_n(table, columns::POPULARITY, options.top_popular)?
        .select(&[columns::POPULARITY, columns::ORIGINAL_TITLE])?;

    let exploded_duplicates = output
        .views
        .iter()
        .map(|v| Ok((v.target_column.clone(), v.table.duplicate_count()?)))
        .collect::<PipelineResult<Vec<_>>>()?;

    let report = AnalysisReport {
        movies: table.row_count(),
        genre_rows,
        genre_counts,
        top_genres_by_decade,
        revenue_rating_counts,
        revenue_vs,
        top_cast,
        top_directors,
        most_popular,
        summaries: describe_all(table),
        exploded_duplicates,
    };

    log_success(format!(
        "{} genres, {} decades, {} cast members ranked",
        report.genre_counts.len(),
        report.top_genres_by_decade.len(),
        report.top_cast.len()
    ));
    Ok(report)
}

fn top_values(view: Option<&ExplodedView>, n: usize, options: &PipelineOptions) -> PipelineResult<Vec<Frequency>> {
    let Some(view) = view else {
        return Ok(Vec::new());
    };
    let mut counts = value_counts(&view.table, &view.target_column, options.tie_break)?;
    counts.truncate(n);
    Ok(counts)
}

/// The derived table may hold null decades; every other column must be complete.
fn check_clean_input(table: &Table) -> PipelineResult<()> {
    let names: Vec<&str> = table
        .schema()
        .names()
        .into_iter()
        .filter(|name| *name != columns::DECADES)
        .collect();
    check_clean(&table.select(&names)?, "analyze")?;
    Ok(())
}
