//! Versioned configuration data for the survey pipeline.
//!
//! Everything the survey team has revised between questionnaire rounds lives
//! here rather than in code: the rename table from long-form questions to
//! stable field names, the coercion shape of each numeric field, the income
//! bracket table, per-field tag normalization rules, inference cue words, the
//! export trim window, answering-service settings and the organisation colour
//! palette. [`SurveyConfig::default`] is the latest built-in revision; a YAML
//! file can override any section.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::income::{self, IncomeBracket};

pub const CONFIG_REVISION: &str = "2025";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SurveyConfig {
    pub revision: String,
    pub renames: Vec<RenameRule>,
    pub numeric_fields: Vec<NumericField>,
    pub date_fields: Vec<String>,
    pub income: IncomeConfig,
    pub tag_rules: Vec<TagRule>,
    pub fields: SurveyFields,
    pub inference: InferenceConfig,
    pub export: ExportWindow,
    pub service: ServiceConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameRule {
    pub original: String,
    pub stable: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NumericShape {
    /// Comma or period decimal, e.g. `2,5`.
    PlainDecimal,
    /// First digit run inside free text, e.g. `cerca de 45 dias`.
    EmbeddedInteger,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NumericField {
    pub field: String,
    pub shape: NumericShape,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IncomeConfig {
    pub source_field: String,
    pub target_field: String,
    pub revision: String,
    pub brackets: Vec<IncomeBracket>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TagCase {
    Preserve,
    #[default]
    Upper,
    Title,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TagRule {
    pub field: String,
    pub case: TagCase,
    /// Literal separators, matched anywhere.
    pub separators: Vec<String>,
    /// Separators that only split when they stand alone as a word (`E` in
    /// `LAGARTA E BROCA`). Matched after case normalization.
    pub word_separators: Vec<String>,
}

impl Default for TagRule {
    fn default() -> Self {
        Self {
            field: String::new(),
            case: TagCase::Upper,
            separators: vec![",".to_string()],
            word_separators: Vec::new(),
        }
    }
}

impl TagRule {
    pub fn comma_for(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ..Self::default()
        }
    }
}

/// Stable names the filters, KPIs and network builders read. Each one is
/// optional in any given export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SurveyFields {
    pub community: String,
    pub property: String,
    pub respondent: String,
    pub organization: String,
    pub age: String,
    pub sex: String,
    pub cultivation_type: String,
    pub association: String,
    pub association_yes: String,
    pub planted_area: String,
    pub workers: String,
}

impl Default for SurveyFields {
    fn default() -> Self {
        Self {
            community: "Comunidade".to_string(),
            property: "Nome_Propriedade".to_string(),
            respondent: "Nome_Produtor".to_string(),
            organization: "Entidade".to_string(),
            age: "Idade".to_string(),
            sex: "Sexo".to_string(),
            cultivation_type: "Tipo_Cultivo".to_string(),
            association: "Associado_Entidade".to_string(),
            association_yes: "SIM".to_string(),
            planted_area: "Tamanho_Area_Plantada_ha".to_string(),
            workers: "Pessoas_Cultivo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InferenceConfig {
    pub top_n: usize,
    pub max_pie_categories: usize,
    pub max_group_cardinality: usize,
    pub histogram_bins: usize,
    pub no_data_phrases: Vec<String>,
    pub comparison_cues: Vec<String>,
    pub count_cues: Vec<String>,
    pub distribution_cues: Vec<String>,
    pub relation_cues: Vec<String>,
    pub trend_cues: Vec<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            max_pie_categories: 10,
            max_group_cardinality: 10,
            histogram_bins: 10,
            no_data_phrases: strings(&[
                "não há dados",
                "sem dados",
                "nenhum dado disponível",
            ]),
            comparison_cues: strings(&["comparar", "entre"]),
            count_cues: strings(&["quantos", "frequência", "frequencia", "contagem"]),
            distribution_cues: strings(&[
                "distribuição",
                "distribuicao",
                "como estão distribuídos",
            ]),
            relation_cues: strings(&["relação", "relacao", "correlação", "associação"]),
            trend_cues: strings(&["tendência", "evolução", "ao longo do tempo"]),
        }
    }
}

/// Columns dropped from the "full data" export: the first `skip_leading`
/// (form row id) and the last `skip_trailing` (form bookkeeping and derived
/// columns) of the current column order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportWindow {
    pub skip_leading: usize,
    pub skip_trailing: usize,
}

impl Default for ExportWindow {
    fn default() -> Self {
        Self {
            skip_leading: 1,
            skip_trailing: 8,
        }
    }
}

impl ExportWindow {
    pub const NONE: ExportWindow = ExportWindow {
        skip_leading: 0,
        skip_trailing: 0,
    };

    /// Column index range kept out of `column_count` columns.
    pub fn kept_range(&self, column_count: usize) -> std::ops::Range<usize> {
        let start = self.skip_leading.min(column_count);
        let end = column_count.saturating_sub(self.skip_trailing).max(start);
        start..end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_context_rows: usize,
    pub credential_env: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            max_context_rows: 200,
            credential_env: "MANIVA_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    pub hub_label: String,
    pub difficulty_field: String,
    pub palette: BTreeMap<String, String>,
    pub fallback_color: String,
    pub hub_color: String,
    pub property_color: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let palette = [
            ("APRAS", "#d2b48c"),
            ("STTR", "#cd853f"),
            ("ACORJUVE", "#8b4513"),
            ("ACOGLEC", "#a0522d"),
            ("ACOJUV", "#d2691e"),
            ("SINDICATO DO TRABALHADOR", "#bc8f8f"),
            ("CONJUV", "#f4a460"),
            ("ACT", "#daa520"),
            ("N.A.", "#808080"),
        ]
        .into_iter()
        .map(|(org, color)| (org.to_string(), color.to_string()))
        .collect();
        Self {
            hub_label: "MANIVA TAPAJÓS".to_string(),
            difficulty_field: "Dificuldades_Cultivo".to_string(),
            palette,
            fallback_color: "#696969".to_string(),
            hub_color: "#a52a2a".to_string(),
            property_color: "#5d4a36".to_string(),
        }
    }
}

impl Default for IncomeConfig {
    fn default() -> Self {
        Self {
            source_field: "Renda_Familiar".to_string(),
            target_field: "Renda_Familiar_R$".to_string(),
            revision: income::LATEST_REVISION.to_string(),
            brackets: income::builtin_brackets(income::LATEST_REVISION).unwrap_or_default(),
        }
    }
}

const RENAMES: &[(&str, &str)] = &[
    ("Carimbo de data/hora", "Data_Entrevista"),
    ("Nome produtor (entrevistado)", "Nome_Produtor"),
    ("Nome da propriedade", "Nome_Propriedade"),
    ("Qual entidade?", "Entidade"),
    ("É associado a alguma entidade?", "Associado_Entidade"),
    ("Cultiva macaxeira, mandioca ou as duas?", "Tipo_Cultivo"),
    ("Possui Cadastro Ambiental Rural (CAR)?", "Possui_CAR"),
    ("Quantas pessoas trabalham no cultivo?", "Pessoas_Cultivo"),
    ("Tamanho da Propriedade (ha)", "Tamanho_Propriedade_ha"),
    ("Tamanho da área produtiva (ha)", "Tamanho_Area_Produtiva_ha"),
    ("Tamanho da área plantada (ha)", "Tamanho_Area_Plantada_ha"),
    ("Qual a renda familiar absoluta/mês em R$?", "Renda_Familiar"),
    ("Qual(s) variedade(s) de MANDIOCA?", "Variedades_Mandioca"),
    ("Qual(s) variedade(s) de MACAXEIRA?", "Variedades_Macaxeira"),
    ("Com quantos meses colhe a MANDIOCA?", "Meses_Colheita_Mandioca"),
    ("Quantos meses colhe a MACAXEIRA?", "Meses_Colheita_Macaxeira"),
    (
        "Já teve problema com pragas na mandioca/macaxeira???",
        "Teve_Problema_Pragas",
    ),
    ("Quais pragas atacaram a plantação?", "Pragas_Incidentes"),
    (
        "Se sim, quais produtos são comercializados?",
        "Produtos_Comercializados",
    ),
    ("Onde é comercializado os produtos?", "Local_Comercializacao"),
    ("Com quem comercializa os produtos ?", "Compradores"),
    ("Qual o preço médio de farinha atualmente (kg)?", "Preco_Farinha"),
    (
        "Quanto tempo leva a produção da farinha (dias)?",
        "Tempo_Producao_Dias",
    ),
    (
        "Quais as dificuldades encontradas na COMERCIALIZAÇÃO da farinha e derivados?",
        "Dificuldades_Comercializacao",
    ),
    (
        "Quais as principais dificuldades no cultivo mandioca/macaxeira ?",
        "Dificuldades_Cultivo",
    ),
    ("Realiza adubação?", "Adubacao"),
    (
        "Quais as principais dificuldades no PROESSAMENTO da mandioca/macaxeira?",
        "Dificuldades_Processamento",
    ),
    ("Recebe algum tipo de assistência técnica?", "Assistencia_Tecnica"),
    (
        "Qual tamanho da área destinada ao plantio de MANDIOCA (ha)?",
        "Area_Mandioca_ha",
    ),
    (
        "Qual tamanho da área destinada ao plantio de MACAXEIRA (ha)?",
        "Area_Macaxeira_ha",
    ),
];

const NUMERIC_FIELDS: &[(&str, NumericShape)] = &[
    ("Tamanho_Propriedade_ha", NumericShape::PlainDecimal),
    ("Tamanho_Area_Produtiva_ha", NumericShape::PlainDecimal),
    ("Tamanho_Area_Plantada_ha", NumericShape::PlainDecimal),
    ("Idade", NumericShape::PlainDecimal),
    ("Meses_Colheita_Mandioca", NumericShape::PlainDecimal),
    ("Meses_Colheita_Macaxeira", NumericShape::PlainDecimal),
    ("Area_Mandioca_ha", NumericShape::PlainDecimal),
    ("Area_Macaxeira_ha", NumericShape::PlainDecimal),
    ("Preco_Farinha", NumericShape::PlainDecimal),
    ("Tempo_Producao_Dias", NumericShape::EmbeddedInteger),
    ("Pessoas_Cultivo", NumericShape::EmbeddedInteger),
];

impl Default for SurveyConfig {
    fn default() -> Self {
        let renames = RENAMES
            .iter()
            .map(|(original, stable)| RenameRule {
                original: original.to_string(),
                stable: stable.to_string(),
            })
            .collect();
        let numeric_fields = NUMERIC_FIELDS
            .iter()
            .map(|(field, shape)| NumericField {
                field: field.to_string(),
                shape: *shape,
            })
            .collect();
        let tag_rules = vec![
            TagRule {
                field: "Pragas_Incidentes".to_string(),
                case: TagCase::Upper,
                separators: vec![",".to_string()],
                word_separators: vec!["E".to_string()],
            },
            TagRule {
                field: "Compradores".to_string(),
                case: TagCase::Title,
                ..TagRule::default()
            },
            TagRule::comma_for("Produtos_Comercializados"),
            TagRule::comma_for("Variedades_Mandioca"),
            TagRule::comma_for("Variedades_Macaxeira"),
            TagRule::comma_for("Dificuldades_Cultivo"),
            TagRule::comma_for("Dificuldades_Processamento"),
            TagRule::comma_for("Dificuldades_Comercializacao"),
        ];
        Self {
            revision: CONFIG_REVISION.to_string(),
            renames,
            numeric_fields,
            date_fields: vec!["Data_Entrevista".to_string()],
            income: IncomeConfig::default(),
            tag_rules,
            fields: SurveyFields::default(),
            inference: InferenceConfig::default(),
            export: ExportWindow::default(),
            service: ServiceConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl SurveyConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Opening configuration file {path:?}"))?;
        Self::from_yaml_str(&raw).with_context(|| format!("Parsing configuration file {path:?}"))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: SurveyConfig = serde_yaml::from_str(raw)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing configuration")
    }

    /// Hex SHA-256 of the serialized configuration, part of table cache keys.
    pub fn fingerprint(&self) -> String {
        let yaml = self.to_yaml_string().unwrap_or_default();
        hex_digest(yaml.as_bytes())
    }

    /// Rule for `field`, or the comma-and-trim default when none is configured.
    pub fn tag_rule_for(&self, field: &str) -> TagRule {
        self.tag_rules
            .iter()
            .find(|rule| rule.field == field)
            .cloned()
            .unwrap_or_else(|| TagRule::comma_for(field))
    }
}

pub fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_yaml() {
        let config = SurveyConfig::default();
        let yaml = config.to_yaml_string().unwrap();
        let parsed = SurveyConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_sections() {
        let yaml = "revision: teste\nexport:\n  skip_trailing: 2\n";
        let config = SurveyConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.revision, "teste");
        assert_eq!(config.export.skip_leading, 1);
        assert_eq!(config.export.skip_trailing, 2);
        assert_eq!(config.renames, SurveyConfig::default().renames);
    }

    #[test]
    fn export_window_never_inverts() {
        let window = ExportWindow::default();
        assert_eq!(window.kept_range(20), 1..12);
        assert_eq!(window.kept_range(5), 1..1);
        assert_eq!(window.kept_range(0), 0..0);
        assert_eq!(ExportWindow::NONE.kept_range(3), 0..3);
    }

    #[test]
    fn unknown_tag_field_gets_comma_rule() {
        let config = SurveyConfig::default();
        let rule = config.tag_rule_for("Outra_Coluna");
        assert_eq!(rule.separators, vec![",".to_string()]);
        assert_eq!(rule.case, TagCase::Upper);
        assert_eq!(config.tag_rule_for("Compradores").case, TagCase::Title);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let mut config = SurveyConfig::default();
        let before = config.fingerprint();
        assert_eq!(before.len(), 64);
        config.income.brackets[0].value += 1.0;
        assert_ne!(before, config.fingerprint());
    }
}
