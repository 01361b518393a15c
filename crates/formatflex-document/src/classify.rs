// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content classifier — segments raw manuscript text into chapter headings,
// section headings, and body paragraphs.
//
// One line in, one block out. Blank lines are dropped. Each remaining line is
// tested against the rules below in order and the first match wins:
//
//   1. chapter heading: starts with "Chapter <ASCII digit>" (any case), or is short,
//      all caps, and has only a few words
//   2. section heading: shorter than the section limit and does not end in
//      sentence punctuation
//   3. body

use std::sync::LazyLock;

use regex::Regex;

use formatflex_core::types::{Block, BlockKind, trim_text};

static CHAPTER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^chapter\s+[0-9]").unwrap_or_else(|e| panic!("invalid chapter regex: {e}"))
});

/// Heading-detection thresholds.
///
/// The defaults are the long-standing heuristic values; they are kept
/// configurable so callers can tune them without changing the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierThresholds {
    /// All-caps lines must be strictly shorter than this to be chapters.
    pub chapter_max_chars: usize,
    /// All-caps lines may have at most this many words to be chapters.
    pub chapter_max_words: usize,
    /// Unpunctuated lines must be strictly shorter than this to be sections.
    pub section_max_chars: usize,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            chapter_max_chars: 50,
            chapter_max_words: 5,
            section_max_chars: 100,
        }
    }
}

/// Classify `text` with the default thresholds.
pub fn classify(text: &str) -> Vec<Block> {
    classify_with(text, &ClassifierThresholds::default())
}

/// Classify `text` line by line. Output order is reading order.
pub fn classify_with(text: &str, thresholds: &ClassifierThresholds) -> Vec<Block> {
    text.split('\n')
        .map(trim_text)
        .filter(|line| !line.is_empty())
        .map(|line| Block::new(classify_line(line, thresholds), line))
        .collect()
}

/// Classify one already-trimmed, non-empty line.
pub fn classify_line(line: &str, thresholds: &ClassifierThresholds) -> BlockKind {
    let chars = line.chars().count();

    if is_chapter_heading(line, chars, thresholds) {
        BlockKind::ChapterHeading
    } else if chars < thresholds.section_max_chars && !ends_sentence(line) {
        BlockKind::SectionHeading
    } else {
        BlockKind::Body
    }
}

fn is_chapter_heading(line: &str, chars: usize, thresholds: &ClassifierThresholds) -> bool {
    if CHAPTER_PREFIX.is_match(line) {
        return true;
    }
    chars < thresholds.chapter_max_chars
        && line == line.to_uppercase()
        && line.split(' ').count() <= thresholds.chapter_max_words
}

fn ends_sentence(line: &str) -> bool {
    line.ends_with(['.', '!', '?'])
}
