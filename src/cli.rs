use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::io_utils::parse_delimiter;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Explore the Maniva Tapajós cassava producer survey",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show how survey questions map to stable field names and inferred kinds
    Columns(ColumnsArgs),
    /// Headline indicators for the filtered producers
    Summary(SummaryArgs),
    /// Summary statistics for numeric fields
    Stats(StatsArgs),
    /// Render every dashboard panel for the filtered producers
    Dashboard(DashboardArgs),
    /// Rank the answers of a multi-answer field
    Frequency(FrequencyArgs),
    /// Ask one question: textual answer plus an inferred chart
    Ask(AskArgs),
    /// Ask questions line by line from stdin within one session
    Chat(ChatArgs),
    /// Export the filtered producers as CSV
    Export(ExportArgs),
    /// Build or inspect producer network graphs
    Network(NetworkArgs),
    /// Inspect a property coordinates table
    Coordinates(CoordinatesArgs),
    /// Write the built-in configuration as YAML
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Survey export CSV ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML configuration overriding the built-in revision
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Keep only these communities (repeatable)
    #[arg(long = "community", action = clap::ArgAction::Append)]
    pub communities: Vec<String>,
    /// Keep only these sexes (repeatable)
    #[arg(long = "sex", action = clap::ArgAction::Append)]
    pub sexes: Vec<String>,
    /// Keep only these cultivation types (repeatable)
    #[arg(long = "cultivation", action = clap::ArgAction::Append)]
    pub cultivation_types: Vec<String>,
    /// Lower bound of the age range (defaults to the youngest producer)
    #[arg(long = "age-min")]
    pub age_min: Option<f64>,
    /// Upper bound of the age range (defaults to the oldest producer)
    #[arg(long = "age-max")]
    pub age_max: Option<f64>,
    /// Keep producers without a recorded age when filtering by age
    #[arg(long = "keep-missing-age")]
    pub keep_missing_age: bool,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Columns to profile (defaults to every numeric column)
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum SectionArg {
    Profile,
    Cultivation,
    Commercialization,
    Challenges,
}

#[derive(Debug, Args)]
pub struct DashboardArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Only render one section
    #[arg(long, value_enum)]
    pub section: Option<SectionArg>,
    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct FrequencyArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Multi-answer field to rank
    #[arg(short = 'C', long = "column")]
    pub column: String,
    /// Maximum tags to display (0 = all)
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Clone, Args)]
pub struct ServiceArgs {
    /// Answering-service credential (falls back to the configured environment variable)
    #[arg(long = "api-key")]
    pub api_key: Option<String>,
    /// Skip the answering service and only infer the chart
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    #[command(flatten)]
    pub service: ServiceArgs,
    /// Question about the survey, in Portuguese
    #[arg(short = 'q', long = "question")]
    pub question: String,
    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Keep every column instead of applying the configured export window
    #[arg(long)]
    pub full: bool,
    /// Delimiter to use for output
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the output (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct NetworkArgs {
    #[command(subcommand)]
    pub command: NetworkCommand,
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// Build a graph from the survey answers and write it as JSON
    Build(NetworkBuildArgs),
    /// Load a graph JSON file and summarise it
    Inspect(NetworkInspectArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum GraphKind {
    /// Property, organisation and hub nodes
    Organizations,
    /// Difficulty tags linked to respondents
    Difficulties,
}

#[derive(Debug, Args)]
pub struct NetworkBuildArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Which graph to build
    #[arg(long, value_enum, default_value = "organizations")]
    pub kind: GraphKind,
    /// Output JSON file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct NetworkInspectArgs {
    /// Graph JSON file
    #[arg(short = 'g', long = "graph")]
    pub graph: PathBuf,
    /// Only count nodes of this community
    #[arg(long)]
    pub community: Option<String>,
}

#[derive(Debug, Args)]
pub struct CoordinatesArgs {
    /// Coordinates CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Destination YAML file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Built-in income bracket revision to use
    #[arg(long = "income-revision")]
    pub income_revision: Option<String>,
}
