//! Lexical similarity scoring of assembly routines.
//!
//! A generated routine is compared to its reference at two levels: whole normalized lines
//! and bare instruction mnemonics. Both are aligned with [`align::ratio`] and combined into
//! an overall score by [`similarity::score`]. [`batch`] applies this to whole directories of
//! superoptimizer results and merges the scores into each problem's metadata.

pub mod align;
pub mod batch;
pub mod error;
pub mod extract;
pub mod layout;
pub mod normalize;
pub mod report;
pub mod similarity;
pub mod store;

pub use batch::{run, run_with_store, BatchConfig, BatchReport, MergeTarget, ProblemRecord};
pub use error::{BatchError, ProblemWarning};
pub use similarity::{score, score_with, ScoringConfig, SimilarityResult, Weights};
