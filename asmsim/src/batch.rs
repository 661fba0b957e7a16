//! Scores a batch of problems and aggregates the results.

use std::fmt;

use itertools::{Itertools, MinMaxResult};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::{json, Map, Value};

use crate::error::{BatchError, MergeError, Missing, ProblemWarning, StoreError};
use crate::normalize::Normalized;
use crate::similarity::{score_normalized, RoundedSimilarity, ScoringConfig, SimilarityResult};
use crate::store::MetadataStore;

/// Name of the field the scores are merged into.
pub const SIMILARITY_FIELD: &str = "similarity";

/// Name of the correctness flag read from metadata.
pub const CORRECT_FIELD: &str = "correct";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProblemRecord {
    pub id: String,
    pub generated: Option<String>,
    pub reference: Option<String>,
    pub correct: Option<bool>,
    /// Blobs that exist but could not be read, as `<path>: <error>`.
    pub read_errors: Vec<String>,
}

impl ProblemRecord {
    pub fn new(id: impl Into<String>, generated: Option<String>, reference: Option<String>) -> Self {
        ProblemRecord {
            id: id.into(),
            generated,
            reference,
            correct: None,
            read_errors: Vec::new(),
        }
    }

    pub fn with_correct(mut self, correct: bool) -> Self {
        self.correct = Some(correct);
        self
    }
}

/// The object inside a metadata record that holds `correct` and receives `similarity`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeTarget {
    Root,
    /// `record["samples"][key]`
    Sample(String),
}

impl Default for MergeTarget {
    fn default() -> Self {
        MergeTarget::Sample(String::from("0"))
    }
}

impl fmt::Display for MergeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeTarget::Root => write!(f, "<root>"),
            MergeTarget::Sample(key) => write!(f, "samples.{key}"),
        }
    }
}

impl MergeTarget {
    pub fn locate<'a>(&self, metadata: &'a Value) -> Option<&'a Map<String, Value>> {
        match self {
            MergeTarget::Root => metadata.as_object(),
            MergeTarget::Sample(key) => metadata.get("samples")?.get(key)?.as_object(),
        }
    }

    pub fn locate_mut<'a>(&self, metadata: &'a mut Value) -> Option<&'a mut Map<String, Value>> {
        match self {
            MergeTarget::Root => metadata.as_object_mut(),
            MergeTarget::Sample(key) => metadata.get_mut("samples")?.get_mut(key)?.as_object_mut(),
        }
    }

    pub fn correct_flag(&self, metadata: &Value) -> Option<bool> {
        self.locate(metadata)?.get(CORRECT_FIELD)?.as_bool()
    }
}

/// Returns a copy of `metadata` with `similarity` set on the merge target. All other fields are kept as they are.
pub fn merge(metadata: &Value, target: &MergeTarget, similarity: &RoundedSimilarity) -> Result<Value, MergeError> {
    let mut merged = metadata.clone();
    let object = target
        .locate_mut(&mut merged)
        .ok_or_else(|| MergeError::MissingTarget(target.to_string()))?;

    object.insert(
        String::from(SIMILARITY_FIELD),
        json!({
            "line_similarity": similarity.line_similarity,
            "instruction_similarity": similarity.instruction_similarity,
            "overall_similarity": similarity.overall_similarity,
        }),
    );

    Ok(merged)
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    pub scoring: ScoringConfig,
    /// Write the scores back into each problem's metadata.
    pub update: bool,
    pub target: MergeTarget,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            scoring: ScoringConfig::default(),
            update: true,
            target: MergeTarget::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProblemScore {
    pub id: String,
    pub similarity: SimilarityResult,
    pub correct: Option<bool>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Summary {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Option<Summary> {
        let (min, max) = match values.iter().copied().minmax() {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(min, max) => (min, max),
        };

        Some(Summary {
            average: values.iter().sum::<f64>() / values.len() as f64,
            min,
            max,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Correctness {
    pub passed: usize,
    pub total: usize,
}

/// Aggregates over the reported (rounded) scores of all scored problems.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Statistics {
    pub overall: Summary,
    pub line: Summary,
    pub instruction: Summary,
    pub instruction_below_one: usize,
    pub correctness: Option<Correctness>,
}

impl Statistics {
    pub fn of(scores: &[ProblemScore]) -> Option<Statistics> {
        let rounded = scores.iter().map(|s| s.similarity.rounded()).collect::<Vec<_>>();
        let column = |f: fn(&RoundedSimilarity) -> f64| rounded.iter().map(f).collect::<Vec<_>>();
        let instruction = column(|r| r.instruction_similarity);

        // Once any problem carries a flag, every scored problem counts and a missing flag is a failure.
        let correctness = if scores.iter().all(|s| s.correct.is_none()) {
            None
        } else {
            Some(Correctness {
                passed: scores.iter().filter(|s| s.correct == Some(true)).count(),
                total: scores.len(),
            })
        };

        Some(Statistics {
            overall: Summary::of(&column(|r| r.overall_similarity))?,
            line: Summary::of(&column(|r| r.line_similarity))?,
            instruction_below_one: instruction.iter().filter(|&&v| v < 1.0).count(),
            instruction: Summary::of(&instruction)?,
            correctness,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport {
    /// Scored problems, in input order.
    pub scores: Vec<ProblemScore>,
    pub stats: Option<Statistics>,
    pub total: usize,
    pub skipped: usize,
    pub warnings: Vec<ProblemWarning>,
}

impl BatchReport {
    fn new(total: usize, scores: Vec<ProblemScore>, warnings: Vec<ProblemWarning>) -> Self {
        BatchReport {
            stats: Statistics::of(&scores),
            skipped: total - scores.len(),
            total,
            scores,
            warnings,
        }
    }

    pub fn scored(&self) -> usize {
        self.scores.len()
    }

    /// Scores in presentation order: descending instruction similarity, then ascending id.
    pub fn ranked(&self) -> Vec<&ProblemScore> {
        self.scores
            .iter()
            .sorted_by(|a, b| {
                b.similarity
                    .instruction_similarity()
                    .total_cmp(&a.similarity.instruction_similarity())
                    .then_with(|| a.id.cmp(&b.id))
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&ProblemScore> {
        self.scores.iter().find(|s| s.id == id)
    }
}

/// Scores a single record. Records without both blobs are not scored.
pub fn score_record(config: &ScoringConfig, record: &ProblemRecord) -> Result<ProblemScore, ProblemWarning> {
    match (&record.generated, &record.reference) {
        (Some(generated), Some(reference)) => {
            let similarity = score_normalized(config, &Normalized::of(generated), &Normalized::of(reference));
            debug!("{}: {similarity:?}", record.id);

            Ok(ProblemScore {
                id: record.id.clone(),
                similarity,
                correct: record.correct,
            })
        },
        (generated, reference) => Err(ProblemWarning::MissingInput {
            id: record.id.clone(),
            missing: Missing::of(generated.is_some(), reference.is_some()).unwrap_or(Missing::Both),
        }),
    }
}

fn score_all(
    records: &[ProblemRecord], config: &ScoringConfig,
) -> Result<(Vec<ProblemScore>, Vec<ProblemWarning>), BatchError> {
    if records.is_empty() {
        return Err(BatchError::NoProblems);
    }

    let results = records
        .par_iter()
        .map(|record| score_record(config, record))
        .collect::<Vec<_>>();

    let mut scores = Vec::with_capacity(results.len());
    let mut warnings = Vec::new();
    for (record, result) in records.iter().zip(results) {
        warnings.extend(record.read_errors.iter().map(|reason| ProblemWarning::Unreadable {
            id: record.id.clone(),
            reason: reason.clone(),
        }));

        match result {
            Ok(score) => scores.push(score),
            Err(warning) => warnings.push(warning),
        }
    }

    for warning in warnings.iter() {
        warn!("{warning}");
    }

    info!("Scored {} / {} problems", scores.len(), records.len());
    Ok((scores, warnings))
}

/// Scores all records. A record missing a blob is skipped and reported as a warning.
pub fn run(records: &[ProblemRecord], config: &BatchConfig) -> Result<BatchReport, BatchError> {
    let (scores, warnings) = score_all(records, &config.scoring)?;
    Ok(BatchReport::new(records.len(), scores, warnings))
}

/// Like [`run`], but also reads correctness flags from `store` and, if `config.update` is set,
/// merges the scores into each problem's stored metadata.
pub fn run_with_store<S: MetadataStore + ?Sized>(
    records: &[ProblemRecord], config: &BatchConfig, store: &mut S,
) -> Result<BatchReport, BatchError> {
    let (mut scores, mut warnings) = score_all(records, &config.scoring)?;
    for score in scores.iter_mut() {
        if let Err(warning) = sync_metadata(score, config, store) {
            warn!("{warning}");
            warnings.push(warning);
        }
    }

    Ok(BatchReport::new(records.len(), scores, warnings))
}

fn sync_metadata<S: MetadataStore + ?Sized>(
    score: &mut ProblemScore, config: &BatchConfig, store: &mut S,
) -> Result<(), ProblemWarning> {
    let id = score.id.clone();
    let metadata = match store.load(&id) {
        Ok(metadata) => metadata,
        Err(StoreError::NotFound(_)) if !config.update => {
            debug!("{id}: no metadata");
            return Ok(())
        },
        Err(e) => {
            return Err(ProblemWarning::MalformedMetadata {
                id,
                reason: e.to_string(),
            })
        },
    };

    score.correct = score.correct.or_else(|| config.target.correct_flag(&metadata));
    if !config.update {
        return Ok(())
    }

    let merged = match merge(&metadata, &config.target, &score.similarity.rounded()) {
        Ok(merged) => merged,
        Err(e) => {
            return Err(ProblemWarning::MalformedMetadata {
                id,
                reason: e.to_string(),
            })
        },
    };

    if merged == metadata {
        debug!("{id}: metadata already up to date");
        return Ok(())
    }

    store.save(&id, &merged).map_err(|e| ProblemWarning::SaveFailed {
        id: id.clone(),
        reason: e.to_string(),
    })
}
