use serde::{Deserialize, Serialize};

use crate::align::ratio;
use crate::normalize::Normalized;

/// Weight of the line-level score in the overall score.
pub const LINE_WEIGHT: f64 = 0.6;

/// Weight of the instruction-level score in the overall score.
pub const INSTRUCTION_WEIGHT: f64 = 0.4;

/// Number of decimal digits scores are reported with.
pub const REPORT_PRECISION: i32 = 4;

pub fn round_score(value: f64) -> f64 {
    let scale = 10f64.powi(REPORT_PRECISION);
    (value * scale).round() / scale
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub line: f64,
    pub instruction: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            line: LINE_WEIGHT,
            instruction: INSTRUCTION_WEIGHT,
        }
    }
}

impl Weights {
    pub fn combine(&self, line: f64, instruction: f64) -> f64 {
        (self.line * line + self.instruction * instruction).clamp(0.0, 1.0)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ScoringConfig {
    pub weights: Weights,
}

/// Scores of one (generated, reference) pair, at full precision.
///
/// The overall score is always derived from the other two; there is no way to set it directly.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SimilarityResult {
    line_similarity: f64,
    instruction_similarity: f64,
    overall_similarity: f64,
}

impl SimilarityResult {
    pub fn new(weights: &Weights, line_similarity: f64, instruction_similarity: f64) -> Self {
        SimilarityResult {
            line_similarity,
            instruction_similarity,
            overall_similarity: weights.combine(line_similarity, instruction_similarity),
        }
    }

    pub fn line_similarity(&self) -> f64 {
        self.line_similarity
    }

    pub fn instruction_similarity(&self) -> f64 {
        self.instruction_similarity
    }

    pub fn overall_similarity(&self) -> f64 {
        self.overall_similarity
    }

    /// The scores as they are reported and persisted, rounded to [`REPORT_PRECISION`] digits.
    pub fn rounded(&self) -> RoundedSimilarity {
        RoundedSimilarity {
            line_similarity: round_score(self.line_similarity),
            instruction_similarity: round_score(self.instruction_similarity),
            overall_similarity: round_score(self.overall_similarity),
        }
    }
}

/// Reporting view of a [`SimilarityResult`]. This is also the shape of the `similarity` field in merged metadata.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundedSimilarity {
    pub line_similarity: f64,
    pub instruction_similarity: f64,
    pub overall_similarity: f64,
}

pub fn score_normalized(config: &ScoringConfig, generated: &Normalized, reference: &Normalized) -> SimilarityResult {
    let line = ratio(&generated.lines, &reference.lines);
    let instruction = ratio(&generated.instructions, &reference.instructions);

    SimilarityResult::new(&config.weights, line, instruction)
}

pub fn score_with(config: &ScoringConfig, generated: &str, reference: &str) -> SimilarityResult {
    score_normalized(config, &Normalized::of(generated), &Normalized::of(reference))
}

/// Scores `generated` against `reference` with the default weights.
pub fn score(generated: &str, reference: &str) -> SimilarityResult {
    score_with(&ScoringConfig::default(), generated, reference)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    const ROUTINE: &str = "mov eax, 1\nadd eax, 2\nret";

    #[test]
    fn identical_routines() {
        let result = score(ROUTINE, ROUTINE).rounded();
        assert_eq!(result.line_similarity, 1.0);
        assert_eq!(result.instruction_similarity, 1.0);
        assert_eq!(result.overall_similarity, 1.0);
    }

    #[test]
    fn elided_instruction() {
        let result = score("mov eax, 1\nret", ROUTINE).rounded();
        assert_eq!(result.line_similarity, 0.8);
        assert_eq!(result.instruction_similarity, 0.8);
        assert_eq!(result.overall_similarity, 0.8);
    }

    #[test]
    fn comments_and_directives_do_not_count() {
        let noisy = "\t.text\n# computes 3\nmov eax, 1   ; one\n\n.p2align 4\nadd eax, 2\nret\n";
        assert_eq!(score(noisy, ROUTINE), score(ROUTINE, ROUTINE));
    }

    #[test]
    fn operands_only_affect_lines() {
        let result = score("mov ebx, 1\nadd ebx, 2\nret", ROUTINE);
        assert_eq!(result.instruction_similarity(), 1.0);
        assert!(result.line_similarity() < 1.0);
        assert!(result.overall_similarity() < 1.0);
    }

    #[test]
    fn empty_routines_are_identical() {
        let result = score("# nothing here\n.text\n", "");
        assert_eq!(result.line_similarity(), 1.0);
        assert_eq!(result.instruction_similarity(), 1.0);
        assert_eq!(result.overall_similarity(), 1.0);
    }

    #[test]
    fn one_empty_routine() {
        let result = score("", ROUTINE);
        assert_eq!(result.line_similarity(), 0.0);
        assert_eq!(result.instruction_similarity(), 0.0);
        assert_eq!(result.overall_similarity(), 0.0);
    }

    #[test]
    fn overall_is_weighted_sum() {
        let pairs = [
            ("mov eax, 1\nret", ROUTINE),
            ("xor eax, eax\ninc eax\nadd eax, 2\nret", ROUTINE),
            ("lea eax, [rip+3]\nret", ROUTINE),
            ("push rbp\nmov rbp, rsp\nmov eax, 3\npop rbp\nret", ROUTINE),
        ];

        for (generated, reference) in pairs {
            let result = score(generated, reference);
            let expected =
                round_score(LINE_WEIGHT * result.line_similarity() + INSTRUCTION_WEIGHT * result.instruction_similarity());
            assert_eq!(result.rounded().overall_similarity, expected);
            assert!((0.0..=1.0).contains(&result.overall_similarity()));
        }
    }

    #[test]
    fn custom_weights() {
        let config = ScoringConfig {
            weights: Weights {
                line: 0.0,
                instruction: 1.0,
            },
        };
        let result = score_with(&config, "mov ebx, 1\nadd ebx, 2\nret", ROUTINE);
        assert_eq!(result.overall_similarity(), 1.0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_score(2.0 / 3.0), 0.6667);
        assert_eq!(round_score(0.12344), 0.1234);
        assert_eq!(round_score(1.0), 1.0);
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn arb_routine() -> impl Strategy<Value = String> {
        let line = prop_oneof![
            Just("mov eax, 1"),
            Just("add eax, 2"),
            Just("xor eax, eax"),
            Just("ret"),
            Just("nop"),
            Just("  push   rbp # save"),
            Just(".text"),
            Just("f:"),
        ];

        proptest::collection::vec(line, 0..12).prop_map(|lines| lines.join("\n"))
    }

    proptest! {
        #[test]
        fn overall_is_rounded_weighted_sum(generated in arb_routine(), reference in arb_routine()) {
            let result = score(&generated, &reference);
            let rounded = result.rounded();
            prop_assert_eq!(
                rounded.overall_similarity,
                round_score(LINE_WEIGHT * result.line_similarity() + INSTRUCTION_WEIGHT * result.instruction_similarity())
            );

            for value in [rounded.line_similarity, rounded.instruction_similarity, rounded.overall_similarity] {
                prop_assert!((0.0..=1.0).contains(&value), "score {} out of bounds", value);
            }
        }

        #[test]
        fn score_symmetric_and_reflexive(generated in arb_routine(), reference in arb_routine()) {
            prop_assert_eq!(score(&generated, &reference), score(&reference, &generated));
            prop_assert_eq!(score(&generated, &generated).overall_similarity(), 1.0);
        }

        /// Free-form text never produces a score outside [0, 1].
        #[test]
        fn score_bounded_for_any_text(generated in ".{0,200}", reference in ".{0,200}") {
            let result = score(&generated, &reference);
            prop_assert!((0.0..=1.0).contains(&result.line_similarity()));
            prop_assert!((0.0..=1.0).contains(&result.instruction_similarity()));
            prop_assert!((0.0..=1.0).contains(&result.overall_similarity()));
        }
    }
}
