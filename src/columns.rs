//! Column listing for a survey export.
//!
//! Shows each prepared field with the survey question it came from, its
//! inferred kind and how many answers are missing.

use std::collections::HashMap;

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::ColumnsArgs, config::SurveyConfig, frame::ColumnKind, io_utils, preprocess, table,
};

fn kind_label(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Numeric => "numeric",
        ColumnKind::Text => "text",
        ColumnKind::Date => "date",
        ColumnKind::Empty => "empty",
    }
}

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let input = &args.input;
    let config = SurveyConfig::load_or_default(input.config.as_deref())?;
    let encoding = io_utils::resolve_encoding(input.input_encoding.as_deref())?;
    let delimiter = io_utils::resolve_input_delimiter(&input.input, input.delimiter);
    let bytes = io_utils::read_input_bytes(&input.input)?;
    let (table, report) = preprocess::load_survey_bytes(&bytes, delimiter, encoding, &config)
        .with_context(|| format!("Loading survey from {:?}", input.input))?;

    let origins = report
        .renames
        .applied
        .iter()
        .map(|(original, stable)| (stable.as_str(), original.as_str()))
        .collect::<HashMap<_, _>>();

    let rows = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let origin = origins
                .get(column.name.as_str())
                .map(|o| o.to_string())
                .unwrap_or_default();
            vec![
                (idx + 1).to_string(),
                column.name.clone(),
                kind_label(column.kind()).to_string(),
                column.missing_count().to_string(),
                origin,
            ]
        })
        .collect::<Vec<_>>();

    let headers = ["#", "field", "kind", "missing", "question"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!(
        "Listed {} column(s); {} renamed, {} conflicting rename(s)",
        rows.len(),
        report.renames.applied.len(),
        report.renames.conflicts.len()
    );
    Ok(())
}
