//! Transformation stages.
//!
//! - Cleaner: drop low-value columns, duplicates and incomplete rows
//! - Derive: profit, profitability ratio, revenue tier, decade
//! - Explode: one row per token of a multi-valued column
//! - Pipeline: the chain of all stages plus the analysis report

pub mod cleaner;
pub mod derive;
pub mod explode;
pub mod pipeline;

pub use cleaner::{clean, CleanReport};
pub use derive::{derive, Bins, DeriveReport};
pub use explode::{explode, explode_all, split_tokens, ExplodeSpec, ExplodedView};
pub use pipeline::*;
