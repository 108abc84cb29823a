use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Typed cell of a [`crate::frame::SurveyTable`]. Missing cells are `None` at
/// the `Option<Value>` level, never a sentinel variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Timestamp view used to order temporal values; dates sit at midnight.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Value::Date(_) | Value::DateTime(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Tokens the survey exports use for "no answer". Mirrors the NA set of the
/// spreadsheet tooling the survey team exports from.
pub const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "#N/A", "None", "<NA>",
];

pub fn is_missing_token(raw: &str) -> bool {
    MISSING_TOKENS.contains(&raw.trim())
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Standard (period decimal) number parse used at load time. Non-finite
/// results are rejected so `NaN`/`inf` never reach arithmetic.
pub fn parse_standard_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parses a raw CSV field into a typed value with no column context.
pub fn parse_temporal(value: &str) -> Option<Value> {
    let trimmed = value.trim();
    if let Ok(dt) = parse_naive_datetime(trimmed) {
        return Some(Value::DateTime(dt));
    }
    parse_naive_date(trimmed).ok().map(Value::Date)
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        let rendered = format!("{value:.4}");
        rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_naive_date_prefers_day_first_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("06/05/2024").unwrap(), expected);
        assert!(parse_naive_date("maio de 2024").is_err());
    }

    #[test]
    fn parse_temporal_reads_form_timestamps() {
        let parsed = parse_temporal("19/10/2024 14:30:00").unwrap();
        assert_eq!(
            parsed.as_datetime().unwrap(),
            NaiveDateTime::parse_from_str("2024-10-19 14:30:00", "%Y-%m-%d %H:%M:%S").unwrap()
        );
        assert!(matches!(parse_temporal("2024-10-19"), Some(Value::Date(_))));
        assert_eq!(parse_temporal("ontem"), None);
    }

    #[test]
    fn parse_standard_number_rejects_non_finite() {
        assert_eq!(parse_standard_number(" 2.5 "), Some(2.5));
        assert_eq!(parse_standard_number("inf"), None);
        assert_eq!(parse_standard_number("NaN"), None);
        assert_eq!(parse_standard_number("2,5"), None);
    }

    #[test]
    fn format_number_drops_redundant_fraction() {
        assert_eq!(format_number(45.0), "45");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1.0 / 3.0), "0.3333");
    }

    #[test]
    fn missing_tokens_cover_spreadsheet_placeholders() {
        assert!(is_missing_token(" N/A "));
        assert!(is_missing_token(""));
        assert!(!is_missing_token("NÃO"));
    }
}
