use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::batch::{BatchReport, Summary};

const WIDTH: usize = 80;

fn correct_mark(correct: Option<bool>) -> &'static str {
    match correct {
        Some(true) => "✓",
        Some(false) => "✗",
        None => "-",
    }
}

fn write_summary(f: &mut fmt::Formatter<'_>, name: &str, summary: &Summary) -> fmt::Result {
    writeln!(
        f,
        "  {name} - Average: {:.4}, Max: {:.4}, Min: {:.4}",
        summary.average, summary.max, summary.min
    )
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(WIDTH);
        let thin_rule = "-".repeat(WIDTH);

        writeln!(f, "{rule}")?;
        writeln!(f, "Assembly Code Similarity Report")?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;
        writeln!(f, "Total: {} problems ({} scored, {} skipped)", self.total, self.scored(), self.skipped)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<15} {:<12} {:<12} {:<12} {:<8}",
            "Problem ID", "Overall Sim", "Line Similar", "Inst Similar", "Correct"
        )?;
        writeln!(f, "{thin_rule}")?;

        for score in self.ranked() {
            let sim = score.similarity.rounded();
            writeln!(
                f,
                "{:<15} {:<12.4} {:<12.4} {:<12.4} {:<8}",
                score.id,
                sim.overall_similarity,
                sim.line_similarity,
                sim.instruction_similarity,
                correct_mark(score.correct)
            )?;
        }

        writeln!(f, "{thin_rule}")?;

        if let Some(stats) = &self.stats {
            writeln!(f)?;
            writeln!(f, "Statistics:")?;
            write_summary(f, "Overall Similarity", &stats.overall)?;
            write_summary(f, "Line Similarity", &stats.line)?;
            write_summary(f, "Instruction Similarity", &stats.instruction)?;
            writeln!(
                f,
                "  Number of problems with instruction similarity < 1.0: {}",
                stats.instruction_below_one
            )?;

            if let Some(correctness) = &stats.correctness {
                writeln!(f)?;
                writeln!(
                    f,
                    "Correctness Statistics: {}/{} problems passed tests",
                    correctness.passed, correctness.total
                )?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings:")?;
            for warning in self.warnings.iter() {
                writeln!(f, "  {warning}")?;
            }
        }

        write!(f, "{rule}")
    }
}

pub fn write_report(report: &BatchReport, path: &Path) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write!(writer, "{report}")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::batch::{run, BatchConfig, ProblemRecord};

    use super::*;

    const REFERENCE: &str = "mov eax, 1\nadd eax, 2\nret";

    fn report() -> BatchReport {
        let records = vec![
            ProblemRecord::new("problem_2", Some(String::from("mov eax, 1\nret")), Some(String::from(REFERENCE)))
                .with_correct(false),
            ProblemRecord::new("problem_1", Some(String::from(REFERENCE)), Some(String::from(REFERENCE)))
                .with_correct(true),
            ProblemRecord::new("problem_3", None, Some(String::from(REFERENCE))),
        ];

        run(&records, &BatchConfig::default()).unwrap()
    }

    #[test]
    fn renders_rows_in_rank_order() {
        let text = report().to_string();
        let first = text.find("problem_1").unwrap();
        let second = text.find("problem_2").unwrap();
        assert!(first < second);

        assert!(text.contains("problem_1       1.0000       1.0000       1.0000       ✓"));
        assert!(text.contains("problem_2       0.8000       0.8000       0.8000       ✗"));
    }

    #[test]
    fn renders_statistics() {
        let text = report().to_string();
        assert!(text.contains("Total: 3 problems (2 scored, 1 skipped)"));
        assert!(text.contains("  Overall Similarity - Average: 0.9000, Max: 1.0000, Min: 0.8000"));
        assert!(text.contains("  Instruction Similarity - Average: 0.9000, Max: 1.0000, Min: 0.8000"));
        assert!(text.contains("  Number of problems with instruction similarity < 1.0: 1"));
        assert!(text.contains("Correctness Statistics: 1/2 problems passed tests"));
        assert!(text.contains("problem_3: skipped, missing generated assembly"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("similarity_report.txt");
        let report = report();

        write_report(&report, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), report.to_string());
    }
}
