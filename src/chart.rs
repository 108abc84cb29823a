//! Chart data construction from a [`PlotIntent`].
//!
//! This is where an intent meets real cell values, so this is where things can
//! go wrong: a column vanished after filtering, a numeric column holds no
//! values, a tag rule fails to compile. Each failure is a [`ChartError`]
//! value for the caller to report; nothing here aborts a wider render pass.

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use crate::{
    config::SurveyConfig,
    data::format_number,
    frame::{Column, ColumnKind, SurveyTable},
    inference::{ChartKind, PlotIntent},
    stats::{self, FiveNumber},
    table,
    tags::{self, TagCount},
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChartError {
    #[error("column '{0}' is not available")]
    MissingColumn(String),
    #[error("column '{column}' has no usable values")]
    NoData { column: String },
    #[error("column '{column}' is {found:?}, a {chart} chart needs {expected} values")]
    WrongKind {
        column: String,
        chart: &'static str,
        expected: &'static str,
        found: ColumnKind,
    },
    #[error("a {chart} chart needs {expected} column(s), got {found}")]
    Arity {
        chart: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("splitting tags of '{column}' failed: {message}")]
    Tags { column: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxGroup {
    pub label: String,
    pub stats: FiveNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePoint {
    pub at: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartData {
    Histogram {
        column: String,
        bins: Vec<HistogramBin>,
    },
    Box {
        value_column: String,
        group_column: Option<String>,
        groups: Vec<BoxGroup>,
    },
    Scatter {
        x: String,
        y: String,
        points: Vec<(f64, f64)>,
    },
    Line {
        x: String,
        y: String,
        points: Vec<LinePoint>,
    },
    Bar {
        column: String,
        bars: Vec<TagCount>,
    },
    Pie {
        column: String,
        slices: Vec<PieSlice>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    #[serde(flatten)]
    pub data: ChartData,
}

pub fn render(
    table: &SurveyTable,
    intent: &PlotIntent,
    config: &SurveyConfig,
) -> Result<Chart, ChartError> {
    let data = match intent.kind {
        ChartKind::Histogram => {
            let [column] = columns::<1>(intent)?;
            let bins = intent
                .options
                .bins
                .unwrap_or(config.inference.histogram_bins);
            histogram(numeric_column(table, column, "histogram")?, bins)?
        }
        ChartKind::Box => box_plot(table, intent)?,
        ChartKind::Scatter => {
            let [x, y] = columns::<2>(intent)?;
            let xs = numeric_column(table, x, "scatter")?;
            let ys = numeric_column(table, y, "scatter")?;
            let points = xs
                .numbers()
                .zip(ys.numbers())
                .filter_map(|pair| match pair {
                    (Some(a), Some(b)) => Some((a, b)),
                    _ => None,
                })
                .collect::<Vec<_>>();
            if points.is_empty() {
                return Err(ChartError::NoData { column: y.clone() });
            }
            ChartData::Scatter {
                x: x.clone(),
                y: y.clone(),
                points,
            }
        }
        ChartKind::Line => line(table, intent)?,
        ChartKind::Bar => {
            let [column] = columns::<1>(intent)?;
            ChartData::Bar {
                column: column.clone(),
                bars: ranked_values(table, intent, column, config)?,
            }
        }
        ChartKind::Pie => {
            let [column] = columns::<1>(intent)?;
            let counts = ranked_values(table, intent, column, config)?;
            let total = counts.iter().map(|c| c.count).sum::<usize>() as f64;
            let slices = counts
                .into_iter()
                .map(|c| PieSlice {
                    percent: c.count as f64 / total * 100.0,
                    label: c.tag,
                    count: c.count,
                })
                .collect();
            ChartData::Pie {
                column: column.clone(),
                slices,
            }
        }
    };
    Ok(Chart {
        title: intent.title.clone(),
        data,
    })
}

fn columns<const N: usize>(intent: &PlotIntent) -> Result<[&String; N], ChartError> {
    intent
        .columns
        .first_chunk::<N>()
        .map(|chunk| chunk.each_ref())
        .ok_or(ChartError::Arity {
            chart: intent.kind.label(),
            expected: N,
            found: intent.columns.len(),
        })
}

fn lookup<'a>(table: &'a SurveyTable, name: &str) -> Result<&'a Column, ChartError> {
    table
        .column(name)
        .ok_or_else(|| ChartError::MissingColumn(name.to_string()))
}

fn numeric_column<'a>(
    table: &'a SurveyTable,
    name: &str,
    chart: &'static str,
) -> Result<&'a Column, ChartError> {
    let column = lookup(table, name)?;
    match column.kind() {
        ColumnKind::Numeric => Ok(column),
        ColumnKind::Empty => Err(ChartError::NoData {
            column: name.to_string(),
        }),
        found => Err(ChartError::WrongKind {
            column: name.to_string(),
            chart,
            expected: "numeric",
            found,
        }),
    }
}

fn histogram(column: &Column, bins: usize) -> Result<ChartData, ChartError> {
    let values = column.present_numbers();
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Err(ChartError::NoData {
            column: column.name.clone(),
        });
    };
    let bins = bins.max(1);
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; if width > 0.0 { bins } else { 1 }];
    for value in &values {
        let idx = if width > 0.0 {
            (((value - min) / width).floor() as usize).min(bins - 1)
        } else {
            0
        };
        counts[idx] += 1;
    }
    let bins = counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| HistogramBin {
            start: min + width * idx as f64,
            end: if width > 0.0 {
                min + width * (idx + 1) as f64
            } else {
                max
            },
            count,
        })
        .collect();
    Ok(ChartData::Histogram {
        column: column.name.clone(),
        bins,
    })
}

fn box_plot(table: &SurveyTable, intent: &PlotIntent) -> Result<ChartData, ChartError> {
    let [value_name] = columns::<1>(intent)?;
    let values = numeric_column(table, value_name, "box")?;
    let group = match intent.columns.get(1) {
        Some(name) => Some(lookup(table, name)?),
        None => None,
    };

    let groups = match group {
        None => FiveNumber::from_values(&values.present_numbers())
            .map(|stats| {
                vec![BoxGroup {
                    label: value_name.clone(),
                    stats,
                }]
            })
            .unwrap_or_default(),
        Some(group) => {
            let mut buckets: Vec<(String, Vec<f64>)> = Vec::new();
            for (value, label) in values.numbers().zip(group.cells.iter()) {
                let (Some(value), Some(label)) = (value, label) else {
                    continue;
                };
                let label = label.as_display();
                match buckets.iter_mut().find(|(existing, _)| *existing == label) {
                    Some((_, bucket)) => bucket.push(value),
                    None => buckets.push((label, vec![value])),
                }
            }
            buckets.sort_by(|a, b| a.0.cmp(&b.0));
            buckets
                .into_iter()
                .filter_map(|(label, bucket)| {
                    FiveNumber::from_values(&bucket).map(|stats| BoxGroup { label, stats })
                })
                .collect()
        }
    };
    if groups.is_empty() {
        return Err(ChartError::NoData {
            column: value_name.clone(),
        });
    }
    Ok(ChartData::Box {
        value_column: value_name.clone(),
        group_column: group.map(|g| g.name.clone()),
        groups,
    })
}

fn line(table: &SurveyTable, intent: &PlotIntent) -> Result<ChartData, ChartError> {
    let [x, y] = columns::<2>(intent)?;
    let dates = lookup(table, x)?;
    if !matches!(dates.kind(), ColumnKind::Date | ColumnKind::Empty) {
        return Err(ChartError::WrongKind {
            column: x.clone(),
            chart: "line",
            expected: "date",
            found: dates.kind(),
        });
    }
    let values = numeric_column(table, y, "line")?;
    let mut points = dates
        .cells
        .iter()
        .zip(values.numbers())
        .filter_map(|(at, value)| {
            Some(LinePoint {
                at: at.as_ref()?.as_datetime()?,
                value: value?,
            })
        })
        .collect::<Vec<_>>();
    if points.is_empty() {
        return Err(ChartError::NoData { column: y.clone() });
    }
    points.sort_by(|a, b| a.at.cmp(&b.at));
    Ok(ChartData::Line {
        x: x.clone(),
        y: y.clone(),
        points,
    })
}

fn ranked_values(
    table: &SurveyTable,
    intent: &PlotIntent,
    name: &str,
    config: &SurveyConfig,
) -> Result<Vec<TagCount>, ChartError> {
    let column = lookup(table, name)?;
    let top = intent.options.top_n;
    let entries = if intent.options.explode_tags {
        tags::explode_column(column, &config.tag_rule_for(name), top)
            .map_err(|err| ChartError::Tags {
                column: name.to_string(),
                message: format!("{err:#}"),
            })?
            .entries
    } else {
        let mut counts = stats::count_values(table, name)
            .unwrap_or_default()
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect::<Vec<_>>();
        if let Some(limit) = top {
            counts.truncate(limit);
        }
        counts
    };
    if entries.is_empty() {
        return Err(ChartError::NoData {
            column: name.to_string(),
        });
    }
    Ok(entries)
}

/// Plain-text rendering of a chart for the console.
pub fn render_text(chart: &Chart) -> String {
    let (headers, rows): (Vec<&str>, Vec<Vec<String>>) = match &chart.data {
        ChartData::Histogram { bins, .. } => (
            vec!["faixa", "contagem"],
            bins.iter()
                .map(|b| {
                    vec![
                        format!("{} – {}", format_number(b.start), format_number(b.end)),
                        b.count.to_string(),
                    ]
                })
                .collect(),
        ),
        ChartData::Box { groups, .. } => (
            vec!["grupo", "n", "mín", "q1", "mediana", "q3", "máx"],
            groups
                .iter()
                .map(|g| {
                    let s = g.stats;
                    vec![
                        g.label.clone(),
                        s.count.to_string(),
                        format_number(s.min),
                        format_number(s.q1),
                        format_number(s.median),
                        format_number(s.q3),
                        format_number(s.max),
                    ]
                })
                .collect(),
        ),
        ChartData::Scatter { x, y, points } => (
            vec![x.as_str(), y.as_str()],
            points
                .iter()
                .map(|(a, b)| vec![format_number(*a), format_number(*b)])
                .collect(),
        ),
        ChartData::Line { x, y, points } => (
            vec![x.as_str(), y.as_str()],
            points
                .iter()
                .map(|p| vec![p.at.to_string(), format_number(p.value)])
                .collect(),
        ),
        ChartData::Bar { bars, .. } => (
            vec!["resposta", "contagem"],
            bars.iter()
                .map(|b| vec![b.tag.clone(), b.count.to_string()])
                .collect(),
        ),
        ChartData::Pie { slices, .. } => (
            vec!["resposta", "contagem", "%"],
            slices
                .iter()
                .map(|s| {
                    vec![
                        s.label.clone(),
                        s.count.to_string(),
                        format!("{:.1}", s.percent),
                    ]
                })
                .collect(),
        ),
    };
    let headers = headers.into_iter().map(str::to_string).collect::<Vec<_>>();
    format!("{}\n{}", chart.title, table::render_table(&headers, &rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey() -> SurveyTable {
        let headers = [
            "Data_Entrevista",
            "Comunidade",
            "Idade",
            "Preco_Farinha",
            "Pragas_Incidentes",
            "Vazia",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
        let rows = [
            ["21/10/2024", "Castanhal", "45", "6.5", "FORMIGA, lagarta e broca", ""],
            ["19/10/2024", "Maravilha", "38", "7", "formiga", ""],
            ["20/10/2024", "Castanhal", "61", "", "", ""],
            ["22/10/2024", "Castanhal", "52", "8", "", ""],
        ]
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect::<Vec<Vec<String>>>();
        SurveyTable::from_string_rows(&headers, &rows)
    }

    fn draw(intent: PlotIntent) -> Result<Chart, ChartError> {
        render(&survey(), &intent, &SurveyConfig::default())
    }

    #[test]
    fn histogram_counts_every_value_once() {
        let chart = draw(PlotIntent::new(ChartKind::Histogram, &["Idade"], "Idades").with_bins(2))
            .unwrap();
        let ChartData::Histogram { bins, .. } = chart.data else {
            panic!("expected histogram");
        };
        assert_eq!(bins.len(), 2);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 4);
        assert_eq!(bins[1].end, 61.0);
    }

    #[test]
    fn constant_column_makes_single_bin() {
        let column = Column::new("x", vec![Some(crate::data::Value::Number(3.0)); 3]);
        let ChartData::Histogram { bins, .. } = histogram(&column, 10).unwrap() else {
            panic!("expected histogram");
        };
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 3);
    }

    #[test]
    fn box_groups_sorted_by_label() {
        let chart = draw(PlotIntent::new(
            ChartKind::Box,
            &["Idade", "Comunidade"],
            "Idade por comunidade",
        ))
        .unwrap();
        let ChartData::Box { groups, .. } = chart.data else {
            panic!("expected box");
        };
        let labels = groups.iter().map(|g| g.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["Castanhal", "Maravilha"]);
        assert_eq!(groups[0].stats.count, 3);
        assert_eq!(groups[0].stats.median, 52.0);
    }

    #[test]
    fn line_points_are_time_ordered() {
        let chart = draw(PlotIntent::new(
            ChartKind::Line,
            &["Data_Entrevista", "Idade"],
            "Idade no tempo",
        ))
        .unwrap();
        let ChartData::Line { points, .. } = chart.data else {
            panic!("expected line");
        };
        let values = points.iter().map(|p| p.value).collect::<Vec<_>>();
        assert_eq!(values, vec![38.0, 61.0, 45.0, 52.0]);
    }

    #[test]
    fn tag_bar_uses_field_rule() {
        let chart = draw(
            PlotIntent::new(ChartKind::Bar, &["Pragas_Incidentes"], "Pragas")
                .with_top(10)
                .exploding_tags(),
        )
        .unwrap();
        let ChartData::Bar { bars, .. } = chart.data else {
            panic!("expected bar");
        };
        assert_eq!(bars[0], TagCount { tag: "FORMIGA".into(), count: 2 });
        assert_eq!(bars.len(), 3);
    }

    #[test]
    fn pie_percentages_sum_to_hundred() {
        let chart = draw(PlotIntent::new(ChartKind::Pie, &["Comunidade"], "Comunidades")).unwrap();
        let ChartData::Pie { slices, .. } = chart.data else {
            panic!("expected pie");
        };
        let total = slices.iter().map(|s| s.percent).sum::<f64>();
        assert!((total - 100.0).abs() < 1e-9);
        assert_eq!(slices[0].label, "Castanhal");
    }

    #[test]
    fn failures_are_typed() {
        assert_eq!(
            draw(PlotIntent::new(ChartKind::Histogram, &["Renda"], "x")).unwrap_err(),
            ChartError::MissingColumn("Renda".into())
        );
        assert!(matches!(
            draw(PlotIntent::new(ChartKind::Histogram, &["Comunidade"], "x")),
            Err(ChartError::WrongKind { .. })
        ));
        assert!(matches!(
            draw(PlotIntent::new(ChartKind::Bar, &["Vazia"], "x")),
            Err(ChartError::NoData { .. })
        ));
        assert!(matches!(
            draw(PlotIntent::new(ChartKind::Scatter, &["Idade"], "x")),
            Err(ChartError::Arity { expected: 2, .. })
        ));
    }

    #[test]
    fn text_rendering_includes_title() {
        let chart = draw(PlotIntent::new(ChartKind::Pie, &["Comunidade"], "Comunidades")).unwrap();
        let text = render_text(&chart);
        assert!(text.starts_with("Comunidades\n"));
        assert!(text.contains("Maravilha"));
    }
}
