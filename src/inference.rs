//! Question-to-chart inference.
//!
//! Given a free-text question and the prepared table, [`infer`] walks an
//! ordered rule table and returns the first decision made. Every question gets
//! exactly one outcome: a [`PlotIntent`] or no chart. Nothing here touches
//! cell values beyond kind and cardinality checks; building chart data is the
//! job of [`crate::chart`].
//!
//! Rule order:
//!
//! | # | rule | outcome |
//! |---|------|---------|
//! | 1 | `blank-question` | no chart |
//! | 2 | `no-data-phrase` | no chart |
//! | 3 | `numeric-compare-by-group` | box plot of the named numeric column by the first low-cardinality text column |
//! | 4 | `numeric-distribution` | histogram of the named numeric column |
//! | 5 | `text-count` | bar of the top values of the named text column |
//! | 6 | `text-tags` | bar of the top tags of the named multi-answer column |
//! | 7 | `text-pie` | pie of the named text column |
//! | 8 | `text-unchartable` | no chart |
//! | 9 | `matched-without-kind` | no chart |
//! | 10 | `cue-distribution` | histogram of the first numeric column |
//! | 11 | `cue-relation` | scatter of the first two numeric columns |
//! | 12 | `cue-trend` | line of the first numeric column over the first date column |
//! | 13 | `fallback` | no chart |
//!
//! Rules 3–9 only fire when a column name occurs in the question; rules 10–12
//! only when none does.

use log::debug;
use serde::Serialize;

use crate::{
    config::InferenceConfig,
    frame::{Column, ColumnKind, SurveyTable},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Histogram,
    Box,
    Scatter,
    Bar,
    Pie,
    Line,
}

impl ChartKind {
    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Histogram => "histogram",
            ChartKind::Box => "box",
            ChartKind::Scatter => "scatter",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Line => "line",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlotOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub explode_tags: bool,
}

/// Declarative chart request: kind, columns in axis order, and a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlotIntent {
    pub kind: ChartKind,
    pub columns: Vec<String>,
    pub title: String,
    pub options: PlotOptions,
}

impl PlotIntent {
    pub fn new(kind: ChartKind, columns: &[&str], title: impl Into<String>) -> Self {
        Self {
            kind,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            title: title.into(),
            options: PlotOptions::default(),
        }
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.options.top_n = Some(top);
        self
    }

    pub fn with_bins(mut self, bins: usize) -> Self {
        self.options.bins = Some(bins);
        self
    }

    pub fn exploding_tags(mut self) -> Self {
        self.options.explode_tags = true;
        self
    }
}

/// The rule that decided, and what it decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inference {
    pub rule: &'static str,
    pub intent: Option<PlotIntent>,
}

enum Verdict {
    Pass,
    NoChart,
    Chart(PlotIntent),
}

struct Query<'a> {
    lowered: String,
    table: &'a SurveyTable,
    config: &'a InferenceConfig,
    /// Every column whose name occurs in the question, in column order.
    matched: Vec<&'a Column>,
    /// First matched column with a definite kind, with that kind.
    focus: Option<(&'a Column, ColumnKind)>,
}

impl<'a> Query<'a> {
    fn new(question: &str, table: &'a SurveyTable, config: &'a InferenceConfig) -> Self {
        let lowered = question.trim().to_lowercase();
        let matched = if lowered.is_empty() {
            Vec::new()
        } else {
            table
                .columns()
                .iter()
                .filter(|c| !c.name.is_empty() && lowered.contains(&c.name.to_lowercase()))
                .collect::<Vec<_>>()
        };
        let focus = matched.iter().find_map(|column| match column.kind() {
            kind @ (ColumnKind::Numeric | ColumnKind::Text) => Some((*column, kind)),
            ColumnKind::Date | ColumnKind::Empty => None,
        });
        Self {
            lowered,
            table,
            config,
            matched,
            focus,
        }
    }

    fn has_cue(&self, cues: &[String]) -> bool {
        cues.iter()
            .any(|cue| !cue.is_empty() && self.lowered.contains(&cue.to_lowercase()))
    }

    fn focus_of(&self, kind: ColumnKind) -> Option<&'a Column> {
        self.focus
            .and_then(|(column, found)| (found == kind).then_some(column))
    }

    fn columns_of(&self, kind: ColumnKind) -> impl Iterator<Item = &'a Column> + use<'a> {
        let table: &'a SurveyTable = self.table;
        table.columns().iter().filter(move |c| c.kind() == kind)
    }

    fn unmatched(&self) -> bool {
        self.matched.is_empty()
    }
}

type RuleFn = fn(&Query<'_>) -> Verdict;

const RULES: &[(&str, RuleFn)] = &[
    ("blank-question", blank_question),
    ("no-data-phrase", no_data_phrase),
    ("numeric-compare-by-group", numeric_compare_by_group),
    ("numeric-distribution", numeric_distribution),
    ("text-count", text_count),
    ("text-tags", text_tags),
    ("text-pie", text_pie),
    ("text-unchartable", text_unchartable),
    ("matched-without-kind", matched_without_kind),
    ("cue-distribution", cue_distribution),
    ("cue-relation", cue_relation),
    ("cue-trend", cue_trend),
];

pub const FALLBACK_RULE: &str = "fallback";

/// Rule names in evaluation order.
pub fn rule_names() -> impl Iterator<Item = &'static str> {
    RULES
        .iter()
        .map(|(name, _)| *name)
        .chain(std::iter::once(FALLBACK_RULE))
}

pub fn infer(question: &str, table: &SurveyTable, config: &InferenceConfig) -> Inference {
    let query = Query::new(question, table, config);
    for (name, rule) in RULES {
        match rule(&query) {
            Verdict::Pass => continue,
            Verdict::NoChart => return decided(name, None),
            Verdict::Chart(intent) => return decided(name, Some(intent)),
        }
    }
    decided(FALLBACK_RULE, None)
}

fn decided(rule: &'static str, intent: Option<PlotIntent>) -> Inference {
    match &intent {
        Some(intent) => debug!(
            "Inference rule '{rule}' chose a {} chart over {:?}",
            intent.kind.label(),
            intent.columns
        ),
        None => debug!("Inference rule '{rule}' chose no chart"),
    }
    Inference { rule, intent }
}

fn blank_question(query: &Query<'_>) -> Verdict {
    if query.lowered.is_empty() {
        Verdict::NoChart
    } else {
        Verdict::Pass
    }
}

fn no_data_phrase(query: &Query<'_>) -> Verdict {
    let stripped = query
        .lowered
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end();
    if query
        .config
        .no_data_phrases
        .iter()
        .any(|phrase| phrase.to_lowercase() == stripped)
    {
        Verdict::NoChart
    } else {
        Verdict::Pass
    }
}

fn numeric_compare_by_group(query: &Query<'_>) -> Verdict {
    let Some(numeric) = query.focus_of(ColumnKind::Numeric) else {
        return Verdict::Pass;
    };
    if !query.has_cue(&query.config.comparison_cues) {
        return Verdict::Pass;
    }
    let limit = query.config.max_group_cardinality;
    let group = query.columns_of(ColumnKind::Text).find(|c| {
        let distinct = c.distinct_count();
        c.name != numeric.name && (1..=limit).contains(&distinct)
    });
    match group {
        Some(group) => Verdict::Chart(PlotIntent::new(
            ChartKind::Box,
            &[numeric.name.as_str(), group.name.as_str()],
            format!("Distribuição de {} por {}", numeric.name, group.name),
        )),
        None => Verdict::Pass,
    }
}

fn numeric_distribution(query: &Query<'_>) -> Verdict {
    match query.focus_of(ColumnKind::Numeric) {
        Some(numeric) => Verdict::Chart(histogram(numeric, query.config)),
        None => Verdict::Pass,
    }
}

fn text_count(query: &Query<'_>) -> Verdict {
    match query.focus_of(ColumnKind::Text) {
        Some(text) if query.has_cue(&query.config.count_cues) => Verdict::Chart(
            PlotIntent::new(
                ChartKind::Bar,
                &[text.name.as_str()],
                format!("Frequência de {}", text.name),
            )
            .with_top(query.config.top_n),
        ),
        _ => Verdict::Pass,
    }
}

fn text_tags(query: &Query<'_>) -> Verdict {
    match query.focus_of(ColumnKind::Text) {
        Some(text) if text.any_text_contains(',') => Verdict::Chart(
            PlotIntent::new(
                ChartKind::Bar,
                &[text.name.as_str()],
                format!("Respostas mais citadas em {}", text.name),
            )
            .with_top(query.config.top_n)
            .exploding_tags(),
        ),
        _ => Verdict::Pass,
    }
}

fn text_pie(query: &Query<'_>) -> Verdict {
    match query.focus_of(ColumnKind::Text) {
        Some(text) if text.distinct_count() <= query.config.max_pie_categories => {
            Verdict::Chart(PlotIntent::new(
                ChartKind::Pie,
                &[text.name.as_str()],
                format!("Composição de {}", text.name),
            ))
        }
        _ => Verdict::Pass,
    }
}

fn text_unchartable(query: &Query<'_>) -> Verdict {
    if query.focus_of(ColumnKind::Text).is_some() {
        Verdict::NoChart
    } else {
        Verdict::Pass
    }
}

fn matched_without_kind(query: &Query<'_>) -> Verdict {
    if query.unmatched() {
        Verdict::Pass
    } else {
        Verdict::NoChart
    }
}

fn cue_distribution(query: &Query<'_>) -> Verdict {
    if !query.unmatched() || !query.has_cue(&query.config.distribution_cues) {
        return Verdict::Pass;
    }
    match query.columns_of(ColumnKind::Numeric).next() {
        Some(numeric) => Verdict::Chart(histogram(numeric, query.config)),
        None => Verdict::Pass,
    }
}

fn cue_relation(query: &Query<'_>) -> Verdict {
    if !query.unmatched() || !query.has_cue(&query.config.relation_cues) {
        return Verdict::Pass;
    }
    let mut numeric = query.columns_of(ColumnKind::Numeric);
    match (numeric.next(), numeric.next()) {
        (Some(x), Some(y)) => Verdict::Chart(PlotIntent::new(
            ChartKind::Scatter,
            &[x.name.as_str(), y.name.as_str()],
            format!("Relação entre {} e {}", x.name, y.name),
        )),
        _ => Verdict::Pass,
    }
}

fn cue_trend(query: &Query<'_>) -> Verdict {
    if !query.unmatched() || !query.has_cue(&query.config.trend_cues) {
        return Verdict::Pass;
    }
    let date = query.columns_of(ColumnKind::Date).next();
    let numeric = query.columns_of(ColumnKind::Numeric).next();
    match (date, numeric) {
        (Some(x), Some(y)) => Verdict::Chart(PlotIntent::new(
            ChartKind::Line,
            &[x.name.as_str(), y.name.as_str()],
            format!("Evolução de {} ao longo do tempo", y.name),
        )),
        _ => Verdict::Pass,
    }
}

fn histogram(column: &Column, config: &InferenceConfig) -> PlotIntent {
    PlotIntent::new(
        ChartKind::Histogram,
        &[column.name.as_str()],
        format!("Distribuição de {}", column.name),
    )
    .with_bins(config.histogram_bins)
}
