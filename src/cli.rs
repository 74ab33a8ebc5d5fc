use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "dctmap",
    version,
    about = "Map DCT audit questions to company manual sections"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a manual and publish it to the corpus cache.
    Parse(ParseArgs),
    /// Re-parse a published manual from its recorded source file.
    Reparse(ReparseArgs),
    /// Suggest manual sections for a file of questions.
    Suggest(SuggestArgs),
    /// Validate a rule configuration without scoring anything.
    CheckConfig(CheckConfigArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractionArgs {
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    #[arg(long)]
    pub max_pages: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    #[arg(long, default_value = ".cache/dctmap")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    /// AIP, GMM, or any other label (treated as Other).
    #[arg(long)]
    pub manual_type: String,

    #[command(flatten)]
    pub extraction: ExtractionArgs,

    pub path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ReparseArgs {
    #[arg(long, default_value = ".cache/dctmap")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub extraction: ExtractionArgs,

    pub manual_id: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct SuggestArgs {
    #[arg(long, default_value = ".cache/dctmap")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON array of `{qid, text, citations, topic_hints}` records.
    pub questions: PathBuf,

    /// Pin manuals for this audit on first use and reuse the pins afterwards.
    #[arg(long)]
    pub audit: Option<String>,

    #[arg(long, default_value_t = false)]
    pub debug: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckConfigArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/dctmap")]
    pub cache_root: PathBuf,
}
