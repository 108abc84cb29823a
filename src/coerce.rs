//! Total, per-cell coercion of locale-formatted survey answers.
//!
//! Coercion never fails: anything that does not parse becomes missing.
//! Cells that are already numbers are left alone, so re-running coercion over
//! a prepared table changes nothing.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::{
    config::NumericShape,
    data::{Value, parse_temporal},
    frame::{Cell, Column},
};

fn leading_digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("digit pattern is valid"))
}

/// `"2,5"` → 2.5. Comma is the decimal separator; a period is accepted too.
pub fn coerce_plain_decimal(raw: &str) -> Option<f64> {
    let replaced = raw.trim().replace(',', ".");
    if replaced.is_empty() {
        return None;
    }
    replaced.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// `"cerca de 45 dias"` → 45.0, from the first contiguous digit run.
pub fn coerce_embedded_integer(raw: &str) -> Option<f64> {
    leading_digits()
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

pub fn coerce_text(raw: &str, shape: NumericShape) -> Option<f64> {
    match shape {
        NumericShape::PlainDecimal => coerce_plain_decimal(raw),
        NumericShape::EmbeddedInteger => coerce_embedded_integer(raw),
    }
}

pub fn coerce_cell(cell: &Cell, shape: NumericShape) -> Cell {
    match cell {
        Some(Value::Number(n)) => Some(Value::Number(*n)),
        Some(Value::Text(raw)) => coerce_text(raw, shape).map(Value::Number),
        Some(Value::Date(_)) | Some(Value::DateTime(_)) | None => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoercionReport {
    pub converted: usize,
    /// Present cells that could not be coerced and became missing.
    pub unparsed: usize,
}

pub fn coerce_numeric_column(column: &mut Column, shape: NumericShape) -> CoercionReport {
    let mut report = CoercionReport::default();
    for cell in &mut column.cells {
        let was_text = matches!(cell, Some(Value::Text(_)));
        let was_present = cell.is_some();
        let coerced = coerce_cell(cell, shape);
        if was_text && coerced.is_some() {
            report.converted += 1;
        }
        if was_present && coerced.is_none() {
            report.unparsed += 1;
        }
        *cell = coerced;
    }
    report
}

/// Date coercion for configured date fields whose load-time kind was textual
/// (a single malformed timestamp makes the whole column text at load).
pub fn coerce_date_column(column: &mut Column) -> CoercionReport {
    let mut report = CoercionReport::default();
    for cell in &mut column.cells {
        let coerced = match cell.as_ref() {
            Some(value) if value.is_temporal() => cell.clone(),
            Some(Value::Text(raw)) => {
                let parsed = parse_temporal(raw);
                if parsed.is_some() {
                    report.converted += 1;
                } else {
                    report.unparsed += 1;
                }
                parsed
            }
            Some(_) => {
                report.unparsed += 1;
                None
            }
            None => None,
        };
        *cell = coerced;
    }
    report
}
