//! `frequency` command: tag ranking of one multi-answer field.

use anyhow::{Result, anyhow};
use log::{info, warn};

use crate::{cli::FrequencyArgs, filter::SurveyFilter, preprocess, table, tags};

pub fn execute(args: &FrequencyArgs) -> Result<()> {
    let (config, source) = preprocess::load_from_args(&args.input)?;
    let view = SurveyFilter::from_args(&args.filters).apply(&source, &config.fields);
    let column = view
        .column(&args.column)
        .ok_or_else(|| anyhow!("Column '{}' not found", args.column))?;
    let ranking = tags::explode_column(column, &config.tag_rule_for(&args.column), None)?;
    let shown = if args.top == 0 { usize::MAX } else { args.top };

    if !ranking.skipped_rows.is_empty() {
        warn!(
            "{} row(s) of '{}' were not text and were left out",
            ranking.skipped_rows.len(),
            args.column
        );
    }

    let total = ranking.total().max(1) as f64;
    let rows = ranking
        .entries
        .iter()
        .take(shown)
        .map(|entry| {
            vec![
                entry.tag.clone(),
                entry.count.to_string(),
                format!("{:.2}%", entry.count as f64 / total * 100.0),
            ]
        })
        .collect::<Vec<_>>();
    let headers = vec![args.column.clone(), "count".to_string(), "percent".to_string()];
    table::print_table(&headers, &rows);
    info!(
        "Ranked {} distinct tag(s) from {} answering producer(s)",
        ranking.entries.len(),
        ranking.tagged_rows
    );
    Ok(())
}
