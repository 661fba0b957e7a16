//! Turns raw assembly text into token streams that can be aligned.
//!
//! Two streams are derived from the same filtered set of lines: the lines
//! themselves with whitespace collapsed, and the mnemonic of every line.
//! Case is kept exactly as written. `MOV` and `mov` are different tokens.

use itertools::Itertools;
use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

lazy_static! {
    static ref LABEL: Regex = Regex::new(r"^[.A-Za-z_$][A-Za-z0-9_.$]*:$").unwrap();
}

/// Cuts `line` at the first `#` or `;` that is not preceded by a backslash.
fn strip_comment(line: &str) -> &str {
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '#' | ';' => return &line[..index],
            _ => (),
        }
    }

    line
}

pub fn is_label(line: &str) -> bool {
    LABEL.is_match(line)
}

pub fn is_directive(line: &str) -> bool {
    line.starts_with('.')
}

/// Yields the comment-free, trimmed lines of `text` that are neither empty, labels nor directives.
pub fn meaningful_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| strip_comment(line).trim())
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let keep = !is_label(line) && !is_directive(line);
            if !keep {
                trace!("Dropping line: {line:?}");
            }

            keep
        })
}

pub fn normalize_lines(text: &str) -> Vec<String> {
    meaningful_lines(text)
        .map(|line| line.split_whitespace().join(" "))
        .collect()
}

pub fn normalize_instructions(text: &str) -> Vec<String> {
    meaningful_lines(text)
        .flat_map(|line| line.split_whitespace().next())
        .map(String::from)
        .collect()
}

/// Both token streams of a single assembly blob.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Normalized {
    pub lines: Vec<String>,
    pub instructions: Vec<String>,
}

impl Normalized {
    pub fn of(text: &str) -> Self {
        Normalized {
            lines: normalize_lines(text),
            instructions: normalize_instructions(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
