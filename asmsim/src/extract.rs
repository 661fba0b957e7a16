//! Splits a superoptimizer result dump into the per-problem directory layout.
//!
//! The dump maps arbitrary keys to objects with a `problems` map. Every problem that
//! compiled gets its own directory containing the generated assembly of each sample,
//! the unoptimized reference assembly and a `samples.json` with the remaining fields.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ExtractError;
use crate::layout::ProblemLayout;

const ASSEMBLY_FENCE: &str = "```assembly";
const FENCE: &str = "```";

static NULL: Value = Value::Null;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub total_problems: usize,
    pub compiled_problems: usize,
    pub files_written: usize,
    /// Problems and samples skipped because their id cannot be used as part of a file name.
    pub rejected_ids: usize,
}

#[derive(Serialize)]
struct SamplesFile<'a> {
    problem_id: &'a str,
    compilation_failed: &'a Value,
    best_sample_id: &'a Value,
    overall_correct: &'a Value,
    best_speedup: &'a Value,
    unoptimized_assembly_file: &'a str,
    samples: Map<String, Value>,
}

/// Ids from the dump become file names. They must not contain a path separator or `..`.
pub fn is_safe_id(id: &str) -> bool {
    !id.contains(['/', '\\']) && !id.contains("..")
}

pub fn generated_file_name(sample_id: &str) -> String {
    format!("sample_{sample_id}_generated.s")
}

/// Removes a leading ```` ```assembly ```` line and a trailing ```` ``` ```` fence.
pub fn strip_fences(asm: &str) -> &str {
    let mut asm = asm;
    if asm.starts_with(ASSEMBLY_FENCE) {
        asm = match asm.split_once('\n') {
            Some((_, rest)) => rest,
            None => &asm[ASSEMBLY_FENCE.len()..],
        };
    }

    if let Some(rest) = asm.strip_suffix(FENCE) {
        asm = rest;
    }

    asm
}

struct Writer<'a> {
    stats: &'a mut ExtractStats,
}

impl Writer<'_> {
    fn text(&mut self, path: PathBuf, contents: &str) -> Result<(), ExtractError> {
        fs::write(&path, contents).map_err(|source| ExtractError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Generated file: {path:?}");
        self.stats.files_written += 1;

        Ok(())
    }

    fn json(&mut self, path: PathBuf, value: &impl Serialize) -> Result<(), ExtractError> {
        let io_error = |source| ExtractError::Io {
            path: path.clone(),
            source,
        };
        let mut writer = BufWriter::new(File::create(&path).map_err(io_error)?);
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| ExtractError::Json {
            path: path.clone(),
            source,
        })?;
        writer.flush().map_err(io_error)?;
        debug!("Generated file: {path:?}");
        self.stats.files_written += 1;

        Ok(())
    }
}

fn extract_problem(
    writer: &mut Writer, layout: &ProblemLayout, out_dir: &Path, problem_id: &str, problem: &Value,
) -> Result<(), ExtractError> {
    let dir = out_dir.join(format!("{}{problem_id}", layout.prefix));
    fs::create_dir_all(&dir).map_err(|source| ExtractError::Io {
        path: dir.clone(),
        source,
    })?;

    let mut samples = Map::new();
    if let Some(problem_samples) = problem.get("samples").and_then(Value::as_object) {
        for (sample_id, sample) in problem_samples {
            if !is_safe_id(sample_id) {
                warn!("Skipping sample {sample_id:?} of problem {problem_id}: not a valid file name");
                writer.stats.rejected_ids += 1;
                continue;
            }

            let mut info = sample
                .as_object()
                .map(|fields| {
                    fields
                        .iter()
                        .filter(|(key, _)| key.as_str() != "generated_assembly")
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect::<Map<_, _>>()
                })
                .unwrap_or_default();

            if let Some(asm) = sample.get("generated_assembly").and_then(Value::as_str) {
                let file_name = generated_file_name(sample_id);
                writer.text(dir.join(&file_name), asm)?;
                info.insert(String::from("generated_assembly_file"), Value::String(file_name));
            }

            samples.insert(sample_id.clone(), Value::Object(info));
        }
    }

    if let Some(asm) = problem.get("unoptimized_assembly").and_then(Value::as_str) {
        writer.text(dir.join(&layout.reference), strip_fences(asm))?;
    }

    let field = |name: &str| problem.get(name).unwrap_or(&NULL);
    writer.json(
        dir.join(&layout.metadata),
        &SamplesFile {
            problem_id,
            compilation_failed: field("compilation_failed"),
            best_sample_id: field("best_sample_id"),
            overall_correct: field("overall_correct"),
            best_speedup: field("best_speedup"),
            unoptimized_assembly_file: &layout.reference,
            samples,
        },
    )
}

/// Writes the problems of `dump` that compiled into `out_dir`.
pub fn extract_dump(dump: &Value, layout: &ProblemLayout, out_dir: &Path) -> Result<ExtractStats, ExtractError> {
    let entries = dump.as_object().ok_or(ExtractError::NotAnObject)?;
    fs::create_dir_all(out_dir).map_err(|source| ExtractError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut stats = ExtractStats::default();
    for problems in entries
        .values()
        .flat_map(|entry| entry.get("problems"))
        .flat_map(Value::as_object)
    {
        for (problem_id, problem) in problems {
            stats.total_problems += 1;
            if problem.get("compilation_failed") != Some(&Value::Bool(false)) {
                debug!("Skipping problem {problem_id}: did not compile");
                continue;
            }

            if !is_safe_id(problem_id) {
                warn!("Skipping problem {problem_id:?}: not a valid directory name");
                stats.rejected_ids += 1;
                continue;
            }

            stats.compiled_problems += 1;
            info!("Processing problem {problem_id}...");
            extract_problem(&mut Writer { stats: &mut stats }, layout, out_dir, problem_id, problem)?;
        }
    }

    Ok(stats)
}
