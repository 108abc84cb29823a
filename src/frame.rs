//! Column-major survey table with per-column type inference.
//!
//! A [`SurveyTable`] is loaded once from CSV bytes and then treated as
//! immutable: filters build derived views with [`SurveyTable::select_rows`],
//! and the preparation stage works on an owned copy. Column kinds are
//! inferred the way the survey team's spreadsheet tooling does it: a column is
//! numeric only when every non-empty cell is a standard number, temporal when
//! every non-empty cell is a date, textual otherwise.

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result, bail};
use encoding_rs::Encoding;
use serde::Serialize;

use crate::{
    config::hex_digest,
    data::{Value, is_missing_token, parse_standard_number, parse_temporal},
    io_utils,
};

pub type Cell = Option<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Text,
    Date,
    /// No present values, so no definite kind.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        let mut seen_number = false;
        let mut seen_temporal = false;
        let mut seen_text = false;
        for value in self.cells.iter().flatten() {
            match value {
                Value::Number(_) => seen_number = true,
                Value::Date(_) | Value::DateTime(_) => seen_temporal = true,
                Value::Text(_) => seen_text = true,
            }
        }
        match (seen_number, seen_temporal, seen_text) {
            (false, false, false) => ColumnKind::Empty,
            (true, false, false) => ColumnKind::Numeric,
            (false, true, false) => ColumnKind::Date,
            _ => ColumnKind::Text,
        }
    }

    pub fn numbers(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.cells
            .iter()
            .map(|cell| cell.as_ref().and_then(Value::as_number))
    }

    pub fn present_numbers(&self) -> Vec<f64> {
        self.numbers().flatten().collect()
    }

    /// Number of distinct present values, compared by display form.
    pub fn distinct_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .map(Value::as_display)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn any_text_contains(&self, needle: char) -> bool {
        self.cells
            .iter()
            .flatten()
            .filter_map(Value::as_text)
            .any(|text| text.contains(needle))
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_none()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyTable {
    columns: Vec<Column>,
    row_count: usize,
    content_hash: Option<String>,
}

impl SurveyTable {
    /// Builds a table from raw string rows, inferring column kinds.
    pub fn from_string_rows(headers: &[String], rows: &[Vec<String>]) -> Self {
        let headers = disambiguate_headers(headers);
        let mut candidates = vec![KindCandidate::new(); headers.len()];
        for row in rows {
            for (idx, candidate) in candidates.iter_mut().enumerate() {
                if let Some(raw) = row.get(idx) {
                    candidate.observe(raw);
                }
            }
        }
        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let kind = candidates[idx].decide();
                let cells = rows
                    .iter()
                    .map(|row| row.get(idx).and_then(|raw| typed_cell(raw, kind)))
                    .collect();
                Column { name, cells }
            })
            .collect();
        Self {
            columns,
            row_count: rows.len(),
            content_hash: None,
        }
    }

    pub fn from_csv_bytes(bytes: &[u8], delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let text = io_utils::decode_bytes(bytes, encoding)?;
        let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter);
        let headers = reader
            .headers()
            .context("Reading header row")?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let mut rows = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
            rows.push(record.iter().map(|f| f.to_string()).collect::<Vec<_>>());
        }
        let mut table = Self::from_string_rows(&headers, &rows);
        table.content_hash = Some(hex_digest(bytes));
        Ok(table)
    }

    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.column(name).map(Column::kind)
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name)
            .and_then(|c| c.cells.get(row))
            .and_then(Option::as_ref)
    }

    /// Replaces the column of the same name or appends a new one at the end.
    pub fn upsert_column(&mut self, column: Column) -> Result<()> {
        if column.cells.len() != self.row_count {
            bail!(
                "Column '{}' has {} cell(s), table has {} row(s)",
                column.name,
                column.cells.len(),
                self.row_count
            );
        }
        match self.column_index(&column.name) {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_mut(from) {
            Some(column) => {
                column.name = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Derived view over the given row indices, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> SurveyTable {
        let columns = self
            .columns
            .iter()
            .map(|column| Column {
                name: column.name.clone(),
                cells: rows
                    .iter()
                    .map(|&idx| column.cells.get(idx).cloned().flatten())
                    .collect(),
            })
            .collect();
        SurveyTable {
            columns,
            row_count: rows.len(),
            content_hash: None,
        }
    }

    /// Derived view over a contiguous column range.
    pub fn select_column_range(&self, range: std::ops::Range<usize>) -> SurveyTable {
        let columns = self
            .columns
            .get(range)
            .map(|slice| slice.to_vec())
            .unwrap_or_default();
        SurveyTable {
            columns,
            row_count: self.row_count,
            content_hash: None,
        }
    }

    /// Row as display strings, missing cells rendered empty.
    pub fn display_row(&self, row: usize) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| {
                c.cells
                    .get(row)
                    .and_then(Option::as_ref)
                    .map(Value::as_display)
                    .unwrap_or_default()
            })
            .collect()
    }

    pub fn to_csv_string(&self, delimiter: u8, max_rows: Option<usize>) -> Result<String> {
        let mut writer = io_utils::csv_writer_builder(delimiter).from_writer(Vec::new());
        writer
            .write_record(self.headers())
            .context("Writing header row")?;
        let limit = max_rows.unwrap_or(self.row_count).min(self.row_count);
        for row in 0..limit {
            writer
                .write_record(self.display_row(row))
                .with_context(|| format!("Writing row {}", row + 2))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("Flushing CSV buffer: {}", err.error()))?;
        Ok(String::from_utf8(bytes)?)
    }
}

fn disambiguate_headers(headers: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .iter()
        .map(|header| {
            let count = seen.entry(header.clone()).or_insert(0);
            let name = if *count == 0 {
                header.clone()
            } else {
                format!("{header}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

fn typed_cell(raw: &str, kind: ColumnKind) -> Cell {
    if is_missing_token(raw) {
        return None;
    }
    match kind {
        ColumnKind::Numeric => parse_standard_number(raw).map(Value::Number),
        ColumnKind::Date => parse_temporal(raw),
        ColumnKind::Text | ColumnKind::Empty => Some(Value::Text(raw.to_string())),
    }
}

#[derive(Debug, Clone)]
struct KindCandidate {
    possible_number: bool,
    possible_temporal: bool,
    observed: usize,
}

impl KindCandidate {
    fn new() -> Self {
        Self {
            possible_number: true,
            possible_temporal: true,
            observed: 0,
        }
    }

    fn observe(&mut self, raw: &str) {
        if is_missing_token(raw) {
            return;
        }
        self.observed += 1;
        if self.possible_number && parse_standard_number(raw).is_none() {
            self.possible_number = false;
        }
        if self.possible_temporal && parse_temporal(raw).is_none() {
            self.possible_temporal = false;
        }
    }

    fn decide(&self) -> ColumnKind {
        if self.observed == 0 {
            ColumnKind::Empty
        } else if self.possible_number {
            ColumnKind::Numeric
        } else if self.possible_temporal {
            ColumnKind::Date
        } else {
            ColumnKind::Text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    fn sample() -> SurveyTable {
        let csv = "Comunidade,Idade,Preço,Data\n\
                   Castanhal,45,\"2,5\",19/10/2024\n\
                   Maravilha,NA,3.0,20/10/2024\n\
                   Castanhal,61,,\n";
        SurveyTable::from_csv_bytes(csv.as_bytes(), b',', UTF_8).unwrap()
    }

    #[test]
    fn infers_kinds_per_column() {
        let table = sample();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.kind_of("Comunidade"), Some(ColumnKind::Text));
        assert_eq!(table.kind_of("Idade"), Some(ColumnKind::Numeric));
        assert_eq!(table.kind_of("Preço"), Some(ColumnKind::Text));
        assert_eq!(table.kind_of("Data"), Some(ColumnKind::Date));
        assert_eq!(table.cell(1, "Idade"), None);
        assert!(table.content_hash().is_some());
    }

    #[test]
    fn duplicate_headers_are_suffixed() {
        let headers = vec!["A".to_string(), "A".to_string(), "A".to_string()];
        let table = SurveyTable::from_string_rows(&headers, &[]);
        assert_eq!(table.headers(), vec!["A", "A.1", "A.2"]);
        assert_eq!(table.kind_of("A.1"), Some(ColumnKind::Empty));
    }

    #[test]
    fn ragged_rows_pad_with_missing() {
        let csv = "a,b,c\n1,2\n3,4,5\n";
        let table = SurveyTable::from_csv_bytes(csv.as_bytes(), b',', UTF_8).unwrap();
        assert_eq!(table.cell(0, "c"), None);
        assert_eq!(table.cell(1, "c"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn select_rows_leaves_source_untouched() {
        let table = sample();
        let view = table.select_rows(&[2]);
        assert_eq!(view.row_count(), 1);
        assert_eq!(view.cell(0, "Idade"), Some(&Value::Number(61.0)));
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn upsert_rejects_mismatched_length() {
        let mut table = sample();
        assert!(table.upsert_column(Column::new("x", vec![None])).is_err());
        table
            .upsert_column(Column::new("x", vec![None, None, None]))
            .unwrap();
        assert_eq!(table.headers().last().map(String::as_str), Some("x"));
    }

    #[test]
    fn csv_rendering_respects_row_limit() {
        let table = sample();
        let rendered = table.to_csv_string(b',', Some(1)).unwrap();
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "Castanhal,45,\"2,5\",2024-10-19");
    }
}
