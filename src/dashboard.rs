//! Dashboard sections as a declarative panel table.
//!
//! Each panel is a [`PlotIntent`] plus the notice shown when its data is
//! missing. Panels render independently: a missing field or a failed chart
//! turns into that panel's [`PanelOutcome`] and the rest of the dashboard is
//! still produced.

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;

use crate::{
    chart::{self, Chart, ChartError},
    cli::{DashboardArgs, SectionArg},
    config::SurveyConfig,
    filter::SurveyFilter,
    frame::SurveyTable,
    inference::{ChartKind, PlotIntent},
    preprocess,
    stats::{self, Kpi},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Profile,
    Cultivation,
    Commercialization,
    Challenges,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Profile,
        Section::Cultivation,
        Section::Commercialization,
        Section::Challenges,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            Section::Profile => "Perfil dos Produtores",
            Section::Cultivation => "Práticas de Cultivo",
            Section::Commercialization => "Comercialização e Processamento",
            Section::Challenges => "Dificuldades no Cultivo",
        }
    }
}

impl From<SectionArg> for Section {
    fn from(arg: SectionArg) -> Self {
        match arg {
            SectionArg::Profile => Section::Profile,
            SectionArg::Cultivation => Section::Cultivation,
            SectionArg::Commercialization => Section::Commercialization,
            SectionArg::Challenges => Section::Challenges,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub section: Section,
    pub intent: PlotIntent,
    pub unavailable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PanelOutcome {
    Rendered { chart: Chart },
    Unavailable { message: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelReport {
    pub section: Section,
    pub title: String,
    #[serde(flatten)]
    pub outcome: PanelOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub producers: usize,
    pub kpis: Vec<Kpi>,
    pub panels: Vec<PanelReport>,
}

impl DashboardReport {
    pub fn rendered(&self) -> usize {
        self.panels
            .iter()
            .filter(|p| matches!(p.outcome, PanelOutcome::Rendered { .. }))
            .count()
    }
}

fn panel(section: Section, intent: PlotIntent, what: &str) -> Panel {
    Panel {
        section,
        intent,
        unavailable: format!("Dados de {what} não disponíveis"),
    }
}

pub fn panels(config: &SurveyConfig) -> Vec<Panel> {
    use ChartKind::*;
    use Section::*;

    let fields = &config.fields;
    let top = config.inference.top_n;
    let bins = config.inference.histogram_bins;
    vec![
        panel(
            Profile,
            PlotIntent::new(Bar, &["Possui_CAR"], "Registro de CAR Entre os Produtores"),
            "CAR",
        ),
        panel(
            Profile,
            PlotIntent::new(Pie, &[fields.sex.as_str()], "Distribuição por Gênero"),
            "gênero",
        ),
        panel(
            Profile,
            PlotIntent::new(Bar, &["Escolaridade"], "Nível de Escolaridade"),
            "escolaridade",
        ),
        panel(
            Profile,
            PlotIntent::new(Histogram, &[fields.age.as_str()], "Distribuição Etária")
                .with_bins(bins),
            "idade",
        ),
        panel(
            Profile,
            PlotIntent::new(Pie, &[fields.association.as_str()], "Associação a Entidades"),
            "associação",
        ),
        panel(
            Cultivation,
            PlotIntent::new(
                Scatter,
                &["Area_Mandioca_ha", "Area_Macaxeira_ha"],
                "Relação entre Área de Mandioca e Macaxeira",
            ),
            "área plantada específica",
        ),
        panel(
            Cultivation,
            PlotIntent::new(Bar, &["Variedades_Mandioca"], "Variedades de Mandioca Mais Cultivadas")
                .with_top(top)
                .exploding_tags(),
            "variedades de mandioca",
        ),
        panel(
            Cultivation,
            PlotIntent::new(
                Bar,
                &["Variedades_Macaxeira"],
                "Variedades de Macaxeira Mais Cultivadas",
            )
            .with_top(top)
            .exploding_tags(),
            "variedades de macaxeira",
        ),
        panel(
            Cultivation,
            PlotIntent::new(Box, &["Meses_Colheita_Mandioca"], "Tempo de Colheita da Mandioca (meses)"),
            "tempo de colheita da mandioca",
        ),
        panel(
            Cultivation,
            PlotIntent::new(
                Box,
                &["Meses_Colheita_Macaxeira"],
                "Tempo de Colheita da Macaxeira (meses)",
            ),
            "tempo de colheita da macaxeira",
        ),
        panel(
            Commercialization,
            PlotIntent::new(Bar, &["Produtos_Comercializados"], "Produtos Derivados Comercializados")
                .exploding_tags(),
            "produtos comercializados",
        ),
        panel(
            Commercialization,
            PlotIntent::new(Pie, &["Compradores"], "Para Quem os Produtores Vendem?")
                .exploding_tags(),
            "locais de comercialização",
        ),
        panel(
            Commercialization,
            PlotIntent::new(
                Histogram,
                &["Preco_Farinha"],
                "Distribuição de Preços da Farinha (R$/kg)",
            )
            .with_bins(bins),
            "preço da farinha",
        ),
        panel(
            Commercialization,
            PlotIntent::new(Bar, &["Dificuldades_Comercializacao"], "Dificuldades na Comercialização")
                .exploding_tags(),
            "dificuldades na comercialização",
        ),
        panel(
            Challenges,
            PlotIntent::new(Bar, &["Dificuldades_Cultivo"], "Dificuldades no Cultivo")
                .exploding_tags(),
            "dificuldades no cultivo",
        ),
        panel(
            Challenges,
            PlotIntent::new(Pie, &["Assistencia_Tecnica"], "Acesso à Assistência Técnica"),
            "assistência técnica",
        ),
        panel(
            Challenges,
            PlotIntent::new(Bar, &["Dificuldades_Processamento"], "Dificuldades no Processamento")
                .exploding_tags(),
            "dificuldades no processamento",
        ),
    ]
}

pub fn render_panel(table: &SurveyTable, panel: &Panel, config: &SurveyConfig) -> PanelOutcome {
    match chart::render(table, &panel.intent, config) {
        Ok(chart) => PanelOutcome::Rendered { chart },
        Err(ChartError::MissingColumn(_)) => PanelOutcome::Unavailable {
            message: panel.unavailable.clone(),
        },
        Err(ChartError::NoData { column }) => PanelOutcome::Unavailable {
            message: format!("Nenhum dado válido em '{column}'"),
        },
        Err(err) => {
            warn!("Panel '{}' failed: {err}", panel.intent.title);
            PanelOutcome::Failed {
                message: format!("Erro ao processar '{}': {err}", panel.intent.title),
            }
        }
    }
}

pub fn build_report(
    table: &SurveyTable,
    config: &SurveyConfig,
    section: Option<Section>,
) -> DashboardReport {
    let panels = panels(config)
        .into_iter()
        .filter(|p| section.is_none_or(|s| s == p.section))
        .map(|p| PanelReport {
            section: p.section,
            title: p.intent.title.clone(),
            outcome: render_panel(table, &p, config),
        })
        .collect();
    DashboardReport {
        producers: table.row_count(),
        kpis: stats::headline_kpis(table, config),
        panels,
    }
}

pub fn render_text(report: &DashboardReport) -> String {
    let mut out = String::new();
    for kpi in &report.kpis {
        out.push_str(&format!("{}: {}\n", kpi.label, kpi.metric.display()));
    }
    for section in Section::ALL {
        let mut panels = report.panels.iter().filter(|p| p.section == section).peekable();
        if panels.peek().is_none() {
            continue;
        }
        out.push_str(&format!("\n== {} ==\n", section.heading()));
        for panel in panels {
            match &panel.outcome {
                PanelOutcome::Rendered { chart } => {
                    out.push('\n');
                    out.push_str(&chart::render_text(chart));
                }
                PanelOutcome::Unavailable { message } | PanelOutcome::Failed { message } => {
                    out.push_str(&format!("\n{}\n! {message}\n", panel.title));
                }
            }
        }
    }
    out
}

pub fn execute(args: &DashboardArgs) -> Result<()> {
    let (config, source) = preprocess::load_from_args(&args.input)?;
    let view = SurveyFilter::from_args(&args.filters).apply(&source, &config.fields);
    let report = build_report(&view, &config, args.section.map(Section::from));
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }
    info!(
        "Rendered {} of {} panel(s) for {} producer(s)",
        report.rendered(),
        report.panels.len(),
        report.producers
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey() -> SurveyTable {
        let headers = ["Sexo", "Idade", "Compradores", "Preco_Farinha"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let rows = [
            ["F", "45", "feira, atravessador", "caro"],
            ["M", "38", "Feira", ""],
        ]
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect::<Vec<Vec<String>>>();
        SurveyTable::from_string_rows(&headers, &rows)
    }

    #[test]
    fn every_section_has_panels() {
        let config = SurveyConfig::default();
        let all = panels(&config);
        for section in Section::ALL {
            assert!(all.iter().any(|p| p.section == section));
        }
    }

    #[test]
    fn panels_fail_independently() {
        let config = SurveyConfig::default();
        let report = build_report(&survey(), &config, None);
        let outcome = |title: &str| {
            report
                .panels
                .iter()
                .find(|p| p.title == title)
                .map(|p| p.outcome.clone())
                .unwrap()
        };
        assert!(matches!(outcome("Distribuição por Gênero"), PanelOutcome::Rendered { .. }));
        assert!(matches!(outcome("Distribuição Etária"), PanelOutcome::Rendered { .. }));
        assert_eq!(
            outcome("Nível de Escolaridade"),
            PanelOutcome::Unavailable {
                message: "Dados de escolaridade não disponíveis".into()
            }
        );
        assert!(matches!(
            outcome("Distribuição de Preços da Farinha (R$/kg)"),
            PanelOutcome::Failed { .. }
        ));
        let PanelOutcome::Rendered { chart } = outcome("Para Quem os Produtores Vendem?") else {
            panic!("buyers pie should render");
        };
        let chart::ChartData::Pie { slices, .. } = chart.data else {
            panic!("expected pie");
        };
        assert_eq!(slices[0].label, "Feira");
        assert_eq!(slices[0].count, 2);
    }

    #[test]
    fn section_filter_limits_panels() {
        let config = SurveyConfig::default();
        let report = build_report(&survey(), &config, Some(Section::Challenges));
        assert!(report.panels.iter().all(|p| p.section == Section::Challenges));
        assert_eq!(report.rendered(), 0);
        let text = render_text(&report);
        assert!(text.contains("== Dificuldades no Cultivo =="));
        assert!(!text.contains("Perfil dos Produtores"));
    }
}
