//! Tag explosion for multi-answer survey fields.
//!
//! Fields such as varieties grown or difficulties met hold several answers in
//! one cell (`"FORMIGA, LAGARTA"`). A [`TagRule`] says how one field is split
//! and case-normalized; [`explode_column`] pools every row's tags and ranks
//! them by frequency. A cell that is not text is skipped on its own and
//! reported, the rest of the column still counts.

use anyhow::{Context, Result};
use itertools::Itertools;
use log::warn;
use regex::Regex;
use serde::Serialize;

use crate::{
    config::{TagCase, TagRule},
    data::Value,
    frame::Column,
};

#[derive(Debug, Clone)]
pub struct TagSplitter {
    case: TagCase,
    pattern: Option<Regex>,
}

impl TagSplitter {
    pub fn new(rule: &TagRule) -> Result<Self> {
        let literal = rule
            .separators
            .iter()
            .filter(|sep| !sep.is_empty())
            .map(|sep| regex::escape(sep));
        let words = rule
            .word_separators
            .iter()
            .filter(|word| !word.trim().is_empty())
            .map(|word| format!(r"\b{}\b", regex::escape(word.trim())));
        let alternatives = literal.chain(words).collect::<Vec<_>>();
        let pattern = if alternatives.is_empty() {
            None
        } else {
            let source = alternatives.join("|");
            Some(
                Regex::new(&source)
                    .with_context(|| format!("Building tag separator pattern for '{}'", rule.field))?,
            )
        };
        Ok(Self {
            case: rule.case,
            pattern,
        })
    }

    pub fn split(&self, raw: &str) -> Vec<String> {
        let cased = match self.case {
            TagCase::Upper => raw.to_uppercase(),
            TagCase::Preserve | TagCase::Title => raw.to_string(),
        };
        let pieces: Vec<&str> = match &self.pattern {
            Some(pattern) => pattern.split(&cased).collect(),
            None => vec![cased.as_str()],
        };
        pieces
            .into_iter()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(|tag| match self.case {
                TagCase::Title => title_case(tag),
                TagCase::Preserve | TagCase::Upper => tag.to_string(),
            })
            .collect()
    }
}

/// Upper-cases the first letter of each run of letters and lower-cases the
/// rest. Everything else (hyphens, apostrophes, brackets) is kept as is.
fn title_case(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut in_word = false;
    for ch in tag.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagRanking {
    pub field: String,
    pub entries: Vec<TagCount>,
    /// Rows that contributed at least one tag.
    pub tagged_rows: usize,
    /// Row indices whose cell was present but not text.
    pub skipped_rows: Vec<usize>,
}

impl TagRanking {
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn get(&self, tag: &str) -> Option<usize> {
        self.entries.iter().find(|e| e.tag == tag).map(|e| e.count)
    }
}

/// Ranks tags descending by count (ties alphabetical), truncated to `top`.
pub fn explode_column(column: &Column, rule: &TagRule, top: Option<usize>) -> Result<TagRanking> {
    let splitter = TagSplitter::new(rule)?;
    let mut pool = Vec::new();
    let mut tagged_rows = 0usize;
    let mut skipped_rows = Vec::new();
    for (row, cell) in column.cells.iter().enumerate() {
        match cell {
            None => {}
            Some(Value::Text(raw)) => {
                let tags = splitter.split(raw);
                if !tags.is_empty() {
                    tagged_rows += 1;
                }
                pool.extend(tags);
            }
            Some(other) => {
                warn!(
                    "Skipping row {} of '{}': expected text, found '{other}'",
                    row + 2,
                    column.name
                );
                skipped_rows.push(row);
            }
        }
    }
    let entries = rank_counts(pool.into_iter().counts(), top);
    Ok(TagRanking {
        field: column.name.clone(),
        entries,
        tagged_rows,
        skipped_rows,
    })
}

pub(crate) fn rank_counts(
    counts: std::collections::HashMap<String, usize>,
    top: Option<usize>,
) -> Vec<TagCount> {
    let mut entries = counts
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    if let Some(limit) = top {
        entries.truncate(limit);
    }
    entries
}
