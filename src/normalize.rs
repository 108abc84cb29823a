//! Column normalizer: long-form survey questions to stable field names.

use log::{debug, warn};
use serde::Serialize;

use crate::{config::RenameRule, frame::SurveyTable};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameReport {
    pub applied: Vec<(String, String)>,
    /// Rules whose original question is not a column of this export.
    pub absent: Vec<String>,
    /// Rules skipped because the stable name is already taken by another column.
    pub conflicts: Vec<String>,
}

/// Applies every rule whose original header is present; absent headers are
/// skipped silently. Running it twice is a no-op the second time.
pub fn normalize_columns(table: &mut SurveyTable, rules: &[RenameRule]) -> RenameReport {
    let mut report = RenameReport::default();
    for rule in rules {
        if rule.original == rule.stable {
            continue;
        }
        if !table.has_column(&rule.original) {
            report.absent.push(rule.original.clone());
            continue;
        }
        if table.has_column(&rule.stable) {
            warn!(
                "Not renaming '{}': column '{}' already exists",
                rule.original, rule.stable
            );
            report.conflicts.push(rule.original.clone());
            continue;
        }
        table.rename_column(&rule.original, &rule.stable);
        debug!("Renamed '{}' -> '{}'", rule.original, rule.stable);
        report
            .applied
            .push((rule.original.clone(), rule.stable.clone()));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(original: &str, stable: &str) -> RenameRule {
        RenameRule {
            original: original.to_string(),
            stable: stable.to_string(),
        }
    }

    fn table(headers: &[&str]) -> SurveyTable {
        let headers = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
        SurveyTable::from_string_rows(&headers, &[])
    }

    #[test]
    fn renames_present_and_skips_absent() {
        let mut t = table(&["Comunidade", "Tamanho da Propriedade (ha)"]);
        let rules = [
            rule("Tamanho da Propriedade (ha)", "Tamanho_Propriedade_ha"),
            rule("Realiza adubação?", "Adubacao"),
        ];
        let report = normalize_columns(&mut t, &rules);
        assert_eq!(t.headers(), vec!["Comunidade", "Tamanho_Propriedade_ha"]);
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.absent, vec!["Realiza adubação?".to_string()]);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut t = table(&["Realiza adubação?", "Idade"]);
        let rules = [rule("Realiza adubação?", "Adubacao")];
        normalize_columns(&mut t, &rules);
        let once = t.clone();
        let report = normalize_columns(&mut t, &rules);
        assert_eq!(t, once);
        assert!(report.applied.is_empty());
    }

    #[test]
    fn existing_stable_name_is_not_duplicated() {
        let mut t = table(&["Adubacao", "Realiza adubação?"]);
        let report = normalize_columns(&mut t, &[rule("Realiza adubação?", "Adubacao")]);
        assert_eq!(t.headers(), vec!["Adubacao", "Realiza adubação?"]);
        assert_eq!(report.conflicts.len(), 1);
    }
}
