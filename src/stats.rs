use anyhow::{Result, anyhow};
use log::info;
use serde::Serialize;

use crate::{
    cli::{StatsArgs, SummaryArgs},
    config::SurveyConfig,
    data::{Value, format_number},
    filter::SurveyFilter,
    frame::{ColumnKind, SurveyTable},
    preprocess, table,
};

pub const UNAVAILABLE: &str = "Dado indisponível";

/// Mean over present values; missing values are excluded, not zero-filled.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Linear-interpolated quantile of already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FiveNumber {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl FiveNumber {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            count: sorted.len(),
            min: *sorted.first()?,
            q1: quantile(&sorted, 0.25)?,
            median: quantile(&sorted, 0.5)?,
            q3: quantile(&sorted, 0.75)?,
            max: *sorted.last()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
}

impl NumericSummary {
    pub fn for_column(table: &SurveyTable, name: &str) -> Option<Self> {
        let column = table.column(name)?;
        let values = column.present_numbers();
        let five = FiveNumber::from_values(&values);
        let mean = mean(values.iter().copied().map(Some));
        let std_dev = match (mean, values.len()) {
            (Some(m), n) if n > 1 => {
                let variance =
                    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
                Some(variance.sqrt())
            }
            _ => None,
        };
        Some(Self {
            column: name.to_string(),
            count: values.len(),
            missing: column.cells.len() - values.len(),
            min: five.map(|f| f.min),
            max: five.map(|f| f.max),
            mean,
            median: five.map(|f| f.median),
            std_dev,
        })
    }

    fn render_row(&self) -> Vec<String> {
        let fmt = |v: Option<f64>| v.map(format_number).unwrap_or_default();
        vec![
            self.column.clone(),
            self.count.to_string(),
            self.missing.to_string(),
            fmt(self.min),
            fmt(self.max),
            fmt(self.mean),
            fmt(self.median),
            fmt(self.std_dev),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Metric {
    Available(String),
    Unavailable,
}

impl Metric {
    pub fn display(&self) -> &str {
        match self {
            Metric::Available(value) => value,
            Metric::Unavailable => UNAVAILABLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: &'static str,
    pub metric: Metric,
}

/// Headline indicators of the filtered producers.
pub fn headline_kpis(table: &SurveyTable, config: &SurveyConfig) -> Vec<Kpi> {
    let fields = &config.fields;
    let producers = Kpi {
        label: "Produtores",
        metric: Metric::Available(table.row_count().to_string()),
    };

    let workers = Kpi {
        label: "Pessoas Trabalhando no Cultivo",
        metric: match table.column(&fields.workers) {
            Some(column) => {
                Metric::Available(format_number(column.present_numbers().iter().sum()))
            }
            None => Metric::Unavailable,
        },
    };

    let planted = Kpi {
        label: "Área Plantada Média (ha)",
        metric: mean_metric(table, &fields.planted_area, |m| format!("{m:.1}")),
    };

    let income = Kpi {
        label: "Renda Familiar Média (R$)",
        metric: mean_metric(table, &config.income.target_field, format_thousands),
    };

    let associates = Kpi {
        label: "Associados",
        metric: match table.column(&fields.association) {
            Some(column) => {
                let yes = column
                    .cells
                    .iter()
                    .flatten()
                    .filter(|v| v.as_display() == fields.association_yes)
                    .count();
                let percent = if table.is_empty() {
                    0.0
                } else {
                    yes as f64 / table.row_count() as f64 * 100.0
                };
                Metric::Available(format!("{yes} ({percent:.0}%)"))
            }
            None => Metric::Unavailable,
        },
    };

    vec![producers, workers, planted, income, associates]
}

fn mean_metric(table: &SurveyTable, field: &str, render: impl Fn(f64) -> String) -> Metric {
    let Some(column) = table.column(field) else {
        return Metric::Unavailable;
    };
    match mean(column.numbers()) {
        Some(m) => Metric::Available(render(m)),
        None => Metric::Unavailable,
    }
}

/// `2445.5` → `2,446`, the grouping the dashboard has always shown.
pub fn format_thousands(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

pub fn execute_summary(args: &SummaryArgs) -> Result<()> {
    let (config, source) = preprocess::load_from_args(&args.input)?;
    let view = SurveyFilter::from_args(&args.filters).apply(&source, &config.fields);
    let kpis = headline_kpis(&view, &config);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&kpis)?);
    } else {
        let rows = kpis
            .iter()
            .map(|k| vec![k.label.to_string(), k.metric.display().to_string()])
            .collect::<Vec<_>>();
        table::print_table(&["indicador".to_string(), "valor".to_string()], &rows);
    }
    info!("Summarised {} producer(s)", view.row_count());
    Ok(())
}

pub fn execute_stats(args: &StatsArgs) -> Result<()> {
    let (config, source) = preprocess::load_from_args(&args.input)?;
    let view = SurveyFilter::from_args(&args.filters).apply(&source, &config.fields);
    let columns = resolve_columns(&view, &args.columns)?;
    if columns.is_empty() {
        return Err(anyhow!(
            "No numeric columns available. Provide an explicit column list."
        ));
    }
    let rows = columns
        .iter()
        .filter_map(|name| NumericSummary::for_column(&view, name))
        .map(|summary| summary.render_row())
        .collect::<Vec<_>>();
    let headers = ["column", "count", "missing", "min", "max", "mean", "median", "std_dev"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!("Computed summary statistics for {} column(s)", rows.len());
    Ok(())
}

fn resolve_columns(view: &SurveyTable, specified: &[String]) -> Result<Vec<String>> {
    if specified.is_empty() {
        return Ok(view
            .columns()
            .iter()
            .filter(|c| c.kind() == ColumnKind::Numeric)
            .map(|c| c.name.clone())
            .collect());
    }
    specified
        .iter()
        .map(|name| {
            let kind = view
                .kind_of(name)
                .ok_or_else(|| anyhow!("Column '{name}' not found"))?;
            if !matches!(kind, ColumnKind::Numeric | ColumnKind::Empty) {
                return Err(anyhow!(
                    "Column '{name}' is {kind:?} and cannot be profiled for statistics"
                ));
            }
            Ok(name.clone())
        })
        .collect()
}

pub fn count_values(table: &SurveyTable, name: &str) -> Option<Vec<(String, usize)>> {
    let column = table.column(name)?;
    let counts = itertools::Itertools::counts(column.cells.iter().flatten().map(Value::as_display));
    Some(
        crate::tags::rank_counts(counts, None)
            .into_iter()
            .map(|entry| (entry.tag, entry.count))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[[&str; 3]]) -> SurveyTable {
        let headers = ["Tamanho_Area_Plantada_ha", "Renda_Familiar_R$", "Associado_Entidade"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect::<Vec<Vec<String>>>();
        SurveyTable::from_string_rows(&headers, &rows)
    }

    #[test]
    fn mean_excludes_missing() {
        assert_eq!(mean([Some(1000.0), None, Some(3000.0)]), Some(2000.0));
        assert_eq!(mean([None, None]), None);
        assert_eq!(mean(Vec::<Option<f64>>::new()), None);
    }

    #[test]
    fn quantiles_interpolate_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&[], 0.5), None);
        let five = FiveNumber::from_values(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(five.min, 1.0);
        assert_eq!(five.max, 4.0);
        assert_eq!(five.count, 4);
    }

    #[test]
    fn kpis_degrade_per_indicator() {
        let t = table(&[["2", "1630", "SIM"], ["4", "", "NÃO"], ["", "4075", "SIM"]]);
        let kpis = headline_kpis(&t, &SurveyConfig::default());
        let by_label = |label: &str| {
            kpis.iter()
                .find(|k| k.label == label)
                .map(|k| k.metric.display().to_string())
                .unwrap()
        };
        assert_eq!(by_label("Produtores"), "3");
        assert_eq!(by_label("Área Plantada Média (ha)"), "3.0");
        assert_eq!(by_label("Renda Familiar Média (R$)"), "2,852");
        assert_eq!(by_label("Associados"), "2 (67%)");
        assert_eq!(by_label("Pessoas Trabalhando no Cultivo"), UNAVAILABLE);
    }

    #[test]
    fn numeric_summary_reports_missing() {
        let t = table(&[["2", "", ""], ["4", "", ""], ["", "", ""]]);
        let summary = NumericSummary::for_column(&t, "Tamanho_Area_Plantada_ha").unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.mean, Some(3.0));
        assert_eq!(summary.median, Some(3.0));
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(2852.5), "2,853");
        assert_eq!(format_thousands(815.0), "815");
        assert_eq!(format_thousands(1_234_567.0), "1,234,567");
    }

    #[test]
    fn value_counts_rank_descending() {
        let t = table(&[["2", "", "SIM"], ["4", "", "NÃO"], ["", "", "SIM"]]);
        let counts = count_values(&t, "Associado_Entidade").unwrap();
        assert_eq!(counts[0], ("SIM".to_string(), 2));
        assert!(count_values(&t, "Sexo").is_none());
    }
}
