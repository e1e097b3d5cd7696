//! Rule-based answer extraction.
//!
//! A deterministic stand-in for a real answering component: it picks lines
//! out of the retrieved context without rewriting them.

use std::str::FromStr;

use crate::error::HxError;

const SUMMARY_LINES: usize = 8;
const STEP_LINES: usize = 12;

/// Substrings that mark a line as procedural.
const STEP_KEYWORDS: &[&str] = &["步骤", "流程", "做法", "建议", "注意"];

/// Whole words that mark a line as procedural. Matched case-insensitively.
const STEP_WORDS: &[&str] = &["step", "procedure", "recommend", "note"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// First lines of the context.
    Summary,
    /// Bullet, numbered, or keyword lines; falls back to `Summary`.
    Steps,
}

impl FromStr for SummaryMode {
    type Err = HxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(SummaryMode::Summary),
            "steps" => Ok(SummaryMode::Steps),
            other => Err(HxError::InvalidMode(other.to_string())),
        }
    }
}

/// Extract an answer from `text`. Blank input yields an empty string.
pub fn summarize(text: &str, mode: SummaryMode) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if mode == SummaryMode::Steps {
        let steps: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|l| is_step_line(l))
            .take(STEP_LINES)
            .collect();
        if !steps.is_empty() {
            return steps.join("\n");
        }
    }

    lines
        .into_iter()
        .take(SUMMARY_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_step_line(line: &str) -> bool {
    if line.starts_with('-') || line.starts_with('*') {
        return true;
    }
    if is_numbered(line) {
        return true;
    }
    if STEP_KEYWORDS.iter().any(|k| line.contains(k)) {
        return true;
    }
    let lower = line.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| STEP_WORDS.contains(&word))
}

/// Two digits (ASCII or full-width) followed by `.`, `、` or `．`.
fn is_numbered(line: &str) -> bool {
    let mut chars = line.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(a), Some(b), Some('.' | '、' | '．')) if is_digit(a) && is_digit(b)
    )
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}
