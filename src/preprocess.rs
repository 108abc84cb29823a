//! Preparation stage: rename, coerce and derive over a freshly loaded table.
//!
//! Every step is a no-op when re-run over its own output, so a prepared table
//! can safely be prepared again (for example after a configuration reload).

use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info};
use serde::Serialize;

use crate::{
    cli::InputArgs,
    coerce::{self, CoercionReport},
    config::SurveyConfig,
    frame::SurveyTable,
    income::{self, IncomeReport},
    io_utils,
    normalize::{self, RenameReport},
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreparationReport {
    pub renames: RenameReport,
    pub numeric: Vec<(String, CoercionReport)>,
    pub dates: Vec<(String, CoercionReport)>,
    pub income: Option<IncomeReport>,
}

impl PreparationReport {
    pub fn unparsed_cells(&self) -> usize {
        self.numeric
            .iter()
            .chain(self.dates.iter())
            .map(|(_, report)| report.unparsed)
            .sum()
    }
}

pub fn prepare_table(table: &mut SurveyTable, config: &SurveyConfig) -> Result<PreparationReport> {
    let renames = normalize::normalize_columns(table, &config.renames);

    let mut numeric = Vec::new();
    for field in &config.numeric_fields {
        if let Some(column) = table.column_mut(&field.field) {
            let report = coerce::coerce_numeric_column(column, field.shape);
            debug!(
                "Coerced '{}': {} converted, {} unparsed",
                field.field, report.converted, report.unparsed
            );
            numeric.push((field.field.clone(), report));
        }
    }

    let mut dates = Vec::new();
    for field in &config.date_fields {
        if let Some(column) = table.column_mut(field) {
            dates.push((field.clone(), coerce::coerce_date_column(column)));
        }
    }

    let income = income::apply_income_mapping(table, &config.income)
        .context("Deriving numeric income column")?;

    Ok(PreparationReport {
        renames,
        numeric,
        dates,
        income,
    })
}

pub fn load_survey_bytes(
    bytes: &[u8],
    delimiter: u8,
    encoding: &'static Encoding,
    config: &SurveyConfig,
) -> Result<(SurveyTable, PreparationReport)> {
    let mut table = SurveyTable::from_csv_bytes(bytes, delimiter, encoding)?;
    let report = prepare_table(&mut table, config)?;
    Ok((table, report))
}

pub fn load_survey(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
    config: &SurveyConfig,
) -> Result<SurveyTable> {
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
    let bytes = io_utils::read_input_bytes(path)?;
    let (table, report) = load_survey_bytes(&bytes, delimiter, encoding, config)
        .with_context(|| format!("Loading survey from {path:?}"))?;
    info!(
        "Loaded {} producer(s) across {} column(s) from {:?}; {} field(s) renamed, {} unparsed value(s)",
        table.row_count(),
        table.columns().len(),
        path,
        report.renames.applied.len(),
        report.unparsed_cells()
    );
    Ok(table)
}

/// Configuration plus prepared table for the shared `--input` arguments.
pub fn load_from_args(args: &InputArgs) -> Result<(SurveyConfig, SurveyTable)> {
    let config = SurveyConfig::load_or_default(args.config.as_deref())?;
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let table = load_survey(&args.input, args.delimiter, encoding, &config)?;
    Ok((config, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, frame::ColumnKind};
    use encoding_rs::UTF_8;

    const CSV: &str = "Comunidade,Idade,Qual a renda familiar absoluta/mês em R$?,Qual o preço médio de farinha atualmente (kg)?,Quanto tempo leva a produção da farinha (dias)?\n\
        Castanhal,45,1 SALÁRIO MÍNIMO,\"6,50\",cerca de 45 dias\n\
        Maravilha,38,NÃO INFORMADO,7,30 dias\n";

    #[test]
    fn prepares_renames_coercions_and_income() {
        let config = SurveyConfig::default();
        let (table, report) = load_survey_bytes(CSV.as_bytes(), b',', UTF_8, &config).unwrap();
        assert_eq!(table.cell(0, "Renda_Familiar_R$"), Some(&Value::Number(1630.0)));
        assert_eq!(table.cell(1, "Renda_Familiar_R$"), None);
        assert_eq!(table.cell(0, "Preco_Farinha"), Some(&Value::Number(6.5)));
        assert_eq!(table.cell(0, "Tempo_Producao_Dias"), Some(&Value::Number(45.0)));
        assert_eq!(table.kind_of("Preco_Farinha"), Some(ColumnKind::Numeric));
        assert_eq!(report.renames.applied.len(), 3);
        assert_eq!(report.income.unwrap().unmapped, 1);
    }

    #[test]
    fn preparing_twice_changes_nothing() {
        let config = SurveyConfig::default();
        let (mut table, _) = load_survey_bytes(CSV.as_bytes(), b',', UTF_8, &config).unwrap();
        let once = table.clone();
        let report = prepare_table(&mut table, &config).unwrap();
        assert_eq!(table, once);
        assert!(report.renames.applied.is_empty());
        assert_eq!(report.unparsed_cells(), 0);
    }
}
