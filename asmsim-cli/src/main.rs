use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use asmsim::batch::{run_with_store, BatchConfig, MergeTarget};
use asmsim::extract::extract_dump;
use asmsim::layout::ProblemLayout;
use asmsim::normalize::Normalized;
use asmsim::report::write_report;
use asmsim::similarity::{score_normalized, ScoringConfig};
use clap::Parser;
use log::info;

/// Assembly code similarity between generated and reference routines.
#[derive(clap::Parser)]
enum Args {
    /// Score every problem directory under a base directory and write a report.
    Score {
        #[clap(long, default_value = ".")]
        base_dir: PathBuf,

        #[clap(long, default_value = "problem_")]
        prefix: String,

        #[clap(long, default_value = "sample_0_generated.s")]
        generated: String,

        #[clap(long, default_value = "unoptimized.s")]
        unoptimized: String,

        #[clap(long, default_value = "samples.json")]
        samples_json: String,

        /// Sample in `samples` that receives the scores. Use `--sample-key ''` to merge into the record itself.
        #[clap(long, default_value = "0")]
        sample_key: String,

        /// Only compute similarity, do not update the JSON files.
        #[clap(long)]
        no_update: bool,

        /// Report path (default: <base-dir>/similarity_report.txt)
        #[clap(long)]
        output: Option<PathBuf>,

        /// Only show the final report.
        #[clap(long)]
        quiet: bool,
    },
    /// Score a single pair of assembly files.
    Compare {
        generated: PathBuf,
        reference: PathBuf,

        #[clap(long)]
        json: bool,
    },
    /// Split a JSON result dump into problem directories.
    Extract {
        dump: PathBuf,

        #[clap(long, default_value = "assembly_output")]
        output: PathBuf,
    },
}

fn read_text(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path).map_err(|e| format!("unable to read {}: {e}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    match args {
        Args::Score {
            base_dir,
            prefix,
            generated,
            unoptimized,
            samples_json,
            sample_key,
            no_update,
            output,
            quiet,
        } => {
            let layout = ProblemLayout {
                prefix,
                generated,
                reference: unoptimized,
                metadata: samples_json,
            };
            let config = BatchConfig {
                scoring: ScoringConfig::default(),
                update: !no_update,
                target: if sample_key.is_empty() {
                    MergeTarget::Root
                } else {
                    MergeTarget::Sample(sample_key)
                },
            };

            if !quiet {
                println!("Processing directory: {}", base_dir.canonicalize().unwrap_or_else(|_| base_dir.clone()).display());
                println!("Directory prefix: {}", layout.prefix);
                println!("Generated file: {}", layout.generated);
                println!("Unoptimized file: {}\n", layout.reference);
            }

            let records = layout.load_records(&base_dir)?;
            if !quiet {
                println!("Found {} directories\n", records.len());
            }

            let mut store = layout.store(&base_dir);
            let report = run_with_store(&records, &config, &mut store)?;

            if !quiet {
                for warning in report.warnings.iter() {
                    println!("✗ {warning}");
                }

                for score in report.scores.iter() {
                    println!("✓ {}: Similarity = {:.4}", score.id, score.similarity.rounded().overall_similarity);
                }
            }

            println!("\n{report}");

            if report.scored() == 0 {
                println!("No processable results found");
            }

            let output = output.unwrap_or_else(|| base_dir.join("similarity_report.txt"));
            write_report(&report, &output).map_err(|e| format!("unable to write {}: {e}", output.display()))?;
            println!("\nReport saved to: {}", output.display());
        },
        Args::Compare {
            generated,
            reference,
            json,
        } => {
            let generated = Normalized::of(&read_text(&generated)?);
            let reference = Normalized::of(&read_text(&reference)?);
            info!(
                "Comparing {} / {} lines, {} / {} instructions",
                generated.lines.len(),
                reference.lines.len(),
                generated.instructions.len(),
                reference.instructions.len()
            );

            let result = score_normalized(&ScoringConfig::default(), &generated, &reference).rounded();
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Line similarity:        {:.4}", result.line_similarity);
                println!("Instruction similarity: {:.4}", result.instruction_similarity);
                println!("Overall similarity:     {:.4}", result.overall_similarity);
            }
        },
        Args::Extract {
            dump,
            output,
        } => {
            println!("Reading file: {}", dump.display());
            let file = File::open(&dump).map_err(|e| format!("unable to open {}: {e}", dump.display()))?;
            let data: serde_json::Value = serde_json::from_reader(BufReader::new(file))?;

            println!("Output directory: {}\n", output.display());
            let stats = extract_dump(&data, &ProblemLayout::default(), &output)?;

            println!("{}", "=".repeat(60));
            println!("Complete!");
            println!("Total problems: {}", stats.total_problems);
            println!("Successfully compiled problems: {}", stats.compiled_problems);
            println!("Total files generated: {}", stats.files_written);
            if stats.rejected_ids > 0 {
                println!("Skipped ids that are not valid file names: {}", stats.rejected_ids);
            }
            println!("All files saved to directory: '{}'", output.display());
            println!("{}", "=".repeat(60));
        },
    }

    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use test_log::test;

    use super::Args;

    #[test]
    fn score_defaults() {
        match Args::try_parse_from(["asmsim", "score"]).unwrap() {
            Args::Score {
                base_dir,
                prefix,
                sample_key,
                no_update,
                output,
                ..
            } => {
                assert_eq!(base_dir, std::path::PathBuf::from("."));
                assert_eq!(prefix, "problem_");
                assert_eq!(sample_key, "0");
                assert!(!no_update);
                assert!(output.is_none());
            },
            _ => panic!("expected score"),
        }
    }

    #[test]
    fn score_options() {
        let args = Args::try_parse_from([
            "asmsim",
            "score",
            "--base-dir",
            "/tmp/x",
            "--prefix",
            "task_",
            "--generated",
            "opt.s",
            "--no-update",
        ])
        .unwrap();

        match args {
            Args::Score {
                base_dir,
                prefix,
                generated,
                no_update,
                ..
            } => {
                assert_eq!(base_dir, std::path::PathBuf::from("/tmp/x"));
                assert_eq!(prefix, "task_");
                assert_eq!(generated, "opt.s");
                assert!(no_update);
            },
            _ => panic!("expected score"),
        }
    }

    #[test]
    fn compare_requires_two_files() {
        assert!(Args::try_parse_from(["asmsim", "compare", "a.s"]).is_err());
        assert!(Args::try_parse_from(["asmsim", "compare", "a.s", "b.s", "--json"]).is_ok());
    }
}
