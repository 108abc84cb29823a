use std::path::Path;

use anyhow::Result;
use log::info;

use crate::{
    cli::ExportArgs,
    config::ExportWindow,
    filter::SurveyFilter,
    frame::SurveyTable,
    io_utils, preprocess,
};

/// The filtered view restricted to the export window's columns.
pub fn export_view(view: &SurveyTable, window: ExportWindow) -> SurveyTable {
    view.select_column_range(window.kept_range(view.columns().len()))
}

pub fn execute(args: &ExportArgs) -> Result<()> {
    let (config, source) = preprocess::load_from_args(&args.input)?;
    let view = SurveyFilter::from_args(&args.filters).apply(&source, &config.fields);
    let window = if args.full {
        ExportWindow::NONE
    } else {
        config.export
    };
    let exported = export_view(&view, window);

    let destination = args.output.as_deref();
    let delimiter = args.output_delimiter.unwrap_or_else(|| {
        io_utils::resolve_input_delimiter(destination.unwrap_or(Path::new("-")), None)
    });
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let text = exported.to_csv_string(delimiter, None)?;
    let bytes = io_utils::encode_output(&text, encoding)?;
    io_utils::write_output(destination, &bytes)?;

    info!(
        "Exported {} producer(s) and {} of {} column(s) to {}",
        exported.row_count(),
        exported.columns().len(),
        view.columns().len(),
        io_utils::describe_destination(destination)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(columns: usize) -> SurveyTable {
        let headers = (0..columns).map(|i| format!("c{i}")).collect::<Vec<_>>();
        let rows = vec![(0..columns).map(|i| i.to_string()).collect::<Vec<_>>()];
        SurveyTable::from_string_rows(&headers, &rows)
    }

    #[test]
    fn default_window_drops_first_and_last_eight() {
        let exported = export_view(&wide(12), ExportWindow::default());
        assert_eq!(exported.headers(), vec!["c1", "c2", "c3"]);
        assert_eq!(exported.row_count(), 1);
    }

    #[test]
    fn oversized_window_keeps_nothing() {
        let exported = export_view(&wide(5), ExportWindow::default());
        assert!(exported.columns().is_empty());
        assert_eq!(exported.row_count(), 1);
    }

    #[test]
    fn none_window_keeps_everything() {
        assert_eq!(export_view(&wide(5), ExportWindow::NONE).columns().len(), 5);
    }
}
