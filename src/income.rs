//! Income bracket labels to representative monthly income (R$).
//!
//! The bracket table is closed: a label outside it maps to missing, never to
//! zero, so it drops out of means instead of dragging them down. Bracket
//! values have been revised between survey rounds; each revision is kept
//! under its own name.

use serde::{Deserialize, Serialize};

use crate::{
    config::IncomeConfig,
    data::Value,
    frame::{Column, SurveyTable},
};

pub const LATEST_REVISION: &str = "2025";

pub const BELOW_ONE_WAGE: &str = "MENOR QUE UM SALÁRIO MÍNIMO";
pub const ONE_WAGE: &str = "1 SALÁRIO MÍNIMO";
pub const ONE_TO_TWO_WAGES: &str = "1 A 2 SALÁRIOS MÍNIMOS";
pub const TWO_TO_THREE_WAGES: &str = "2 A 3 SALÁRIOS MÍNIMOS";

const REVISIONS: &[(&str, [f64; 4])] = &[
    ("2024", [1000.0, 1300.0, 2500.0, 4000.0]),
    ("2025", [815.0, 1630.0, 2445.0, 4075.0]),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomeBracket {
    pub label: String,
    pub value: f64,
}

pub fn revisions() -> impl Iterator<Item = &'static str> {
    REVISIONS.iter().map(|(name, _)| *name)
}

pub fn builtin_brackets(revision: &str) -> Option<Vec<IncomeBracket>> {
    let (_, values) = REVISIONS.iter().find(|(name, _)| *name == revision)?;
    let labels = [BELOW_ONE_WAGE, ONE_WAGE, ONE_TO_TWO_WAGES, TWO_TO_THREE_WAGES];
    Some(
        labels
            .iter()
            .zip(values.iter())
            .map(|(label, value)| IncomeBracket {
                label: label.to_string(),
                value: *value,
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncomeTable {
    brackets: Vec<IncomeBracket>,
}

impl IncomeTable {
    pub fn new(brackets: Vec<IncomeBracket>) -> Self {
        Self { brackets }
    }

    pub fn from_config(config: &IncomeConfig) -> Self {
        Self::new(config.brackets.clone())
    }

    /// Exact label match after trimming surrounding whitespace.
    pub fn value_for(&self, label: &str) -> Option<f64> {
        let label = label.trim();
        self.brackets
            .iter()
            .find(|bracket| bracket.label == label)
            .map(|bracket| bracket.value)
    }

    pub fn map_cell(&self, cell: Option<&Value>) -> Option<f64> {
        match cell {
            Some(Value::Text(label)) => self.value_for(label),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IncomeReport {
    pub mapped: usize,
    pub unmapped: usize,
}

/// Writes (or rewrites) the numeric income column next to the bracket labels.
/// Returns `None` when the bracket column is absent from this export.
pub fn apply_income_mapping(
    table: &mut SurveyTable,
    config: &IncomeConfig,
) -> anyhow::Result<Option<IncomeReport>> {
    let Some(source) = table.column(&config.source_field) else {
        return Ok(None);
    };
    let income = IncomeTable::from_config(config);
    let mut report = IncomeReport::default();
    let cells = source
        .cells
        .iter()
        .map(|cell| {
            let mapped = income.map_cell(cell.as_ref());
            match (cell, mapped) {
                (_, Some(_)) => report.mapped += 1,
                (Some(_), None) => report.unmapped += 1,
                (None, None) => {}
            }
            mapped.map(Value::Number)
        })
        .collect();
    table.upsert_column(Column::new(config.target_field.clone(), cells))?;
    Ok(Some(report))
}
