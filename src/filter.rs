//! Producer filters: community, sex, cultivation type and age range.
//!
//! Filters never touch the source table; [`SurveyFilter::apply`] returns a
//! derived view. An empty selection means "no restriction", and a filter whose
//! field is missing from the export is skipped rather than failing.

use log::debug;

use crate::{
    cli::FilterArgs,
    config::SurveyFields,
    data::Value,
    frame::SurveyTable,
};

pub const FALLBACK_AGE_MIN: f64 = 18.0;
pub const FALLBACK_AGE_MAX: f64 = 100.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyFilter {
    pub communities: Vec<String>,
    pub sexes: Vec<String>,
    pub cultivation_types: Vec<String>,
    pub age_min: Option<f64>,
    pub age_max: Option<f64>,
    pub keep_missing_age: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Condition<'a> {
    OneOf { field: &'a str, allowed: &'a [String] },
    AgeBetween { field: &'a str, min: f64, max: f64, keep_missing: bool },
}

impl Condition<'_> {
    fn matches(&self, table: &SurveyTable, row: usize) -> bool {
        match *self {
            Condition::OneOf { field, allowed } => table
                .cell(row, field)
                .map(Value::as_display)
                .is_some_and(|value| allowed.iter().any(|a| a == &value)),
            Condition::AgeBetween {
                field,
                min,
                max,
                keep_missing,
            } => match table.cell(row, field).and_then(Value::as_number) {
                Some(age) => age >= min && age <= max,
                None => keep_missing,
            },
        }
    }
}

/// Observed age bounds widened to whole years, or 18–100 when no age is known.
pub fn default_age_bounds(table: &SurveyTable, fields: &SurveyFields) -> (f64, f64) {
    let ages = table
        .column(&fields.age)
        .map(|c| c.present_numbers())
        .unwrap_or_default();
    if ages.is_empty() {
        return (FALLBACK_AGE_MIN, FALLBACK_AGE_MAX);
    }
    let min = ages.iter().copied().fold(f64::INFINITY, f64::min);
    let max = ages.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min.floor(), max.ceil())
}

impl SurveyFilter {
    pub fn from_args(args: &FilterArgs) -> Self {
        Self {
            communities: args.communities.clone(),
            sexes: args.sexes.clone(),
            cultivation_types: args.cultivation_types.clone(),
            age_min: args.age_min,
            age_max: args.age_max,
            keep_missing_age: args.keep_missing_age,
        }
    }

    fn conditions<'a>(&'a self, table: &SurveyTable, fields: &'a SurveyFields) -> Vec<Condition<'a>> {
        let mut conditions = Vec::new();
        for (field, allowed) in [
            (&fields.community, &self.communities),
            (&fields.sex, &self.sexes),
            (&fields.cultivation_type, &self.cultivation_types),
        ] {
            if !allowed.is_empty() && table.has_column(field) {
                conditions.push(Condition::OneOf {
                    field: field.as_str(),
                    allowed: allowed.as_slice(),
                });
            }
        }
        if table.has_column(&fields.age) {
            let (default_min, default_max) = default_age_bounds(table, fields);
            conditions.push(Condition::AgeBetween {
                field: fields.age.as_str(),
                min: self.age_min.unwrap_or(default_min),
                max: self.age_max.unwrap_or(default_max),
                keep_missing: self.keep_missing_age,
            });
        }
        conditions
    }

    pub fn apply(&self, table: &SurveyTable, fields: &SurveyFields) -> SurveyTable {
        let conditions = self.conditions(table, fields);
        let rows = (0..table.row_count())
            .filter(|&row| conditions.iter().all(|c| c.matches(table, row)))
            .collect::<Vec<_>>();
        debug!(
            "Filter kept {} of {} producer(s) using {} condition(s)",
            rows.len(),
            table.row_count(),
            conditions.len()
        );
        table.select_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SurveyTable {
        let headers = ["Comunidade", "Sexo", "Idade"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let rows = [
            ["Castanhal", "F", "45"],
            ["Maravilha", "M", "38"],
            ["Castanhal", "M", ""],
            ["Pau Darco", "F", "70"],
        ]
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect::<Vec<Vec<String>>>();
        SurveyTable::from_string_rows(&headers, &rows)
    }

    #[test]
    fn default_filter_drops_only_missing_ages() {
        let t = table();
        let view = SurveyFilter::default().apply(&t, &SurveyFields::default());
        assert_eq!(view.row_count(), 3);
        assert_eq!(t.row_count(), 4);
    }

    #[test]
    fn keep_missing_age_retains_everyone() {
        let filter = SurveyFilter {
            keep_missing_age: true,
            ..SurveyFilter::default()
        };
        assert_eq!(filter.apply(&table(), &SurveyFields::default()).row_count(), 4);
    }

    #[test]
    fn selections_combine_with_and() {
        let filter = SurveyFilter {
            communities: vec!["Castanhal".into(), "Pau Darco".into()],
            sexes: vec!["F".into()],
            age_max: Some(50.0),
            ..SurveyFilter::default()
        };
        let view = filter.apply(&table(), &SurveyFields::default());
        assert_eq!(view.row_count(), 1);
        assert_eq!(view.cell(0, "Idade"), Some(&Value::Number(45.0)));
    }

    #[test]
    fn absent_field_skips_its_filter() {
        let filter = SurveyFilter {
            cultivation_types: vec!["MANDIOCA".into()],
            keep_missing_age: true,
            ..SurveyFilter::default()
        };
        assert_eq!(filter.apply(&table(), &SurveyFields::default()).row_count(), 4);
    }

    #[test]
    fn age_bounds_fall_back_without_ages() {
        let headers = vec!["Comunidade".to_string()];
        let t = SurveyTable::from_string_rows(&headers, &[]);
        assert_eq!(
            default_age_bounds(&t, &SurveyFields::default()),
            (FALLBACK_AGE_MIN, FALLBACK_AGE_MAX)
        );
        assert_eq!(default_age_bounds(&table(), &SurveyFields::default()), (38.0, 70.0));
    }
}
