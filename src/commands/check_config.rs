use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::CheckConfigArgs;
use crate::manual::ManualParser;
use crate::matching::MatchConfig;

pub fn run(args: CheckConfigArgs) -> Result<()> {
    let config = MatchConfig::load_or_builtin(args.config.as_deref())?;
    ManualParser::new(&config.parser).context("parser settings are invalid")?;

    let source = args
        .config
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "built-in".to_string());
    info!(
        source = %source,
        config_version = %config.version,
        fingerprint = %config.fingerprint,
        "rule configuration is valid"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    write_summary(&mut output, &source, &config)?;
    output.flush()?;
    Ok(())
}

fn write_summary<W: Write>(output: &mut W, source: &str, config: &MatchConfig) -> Result<()> {
    writeln!(output, "config: {source}")?;
    writeln!(output, "version: {}", config.version)?;
    writeln!(output, "fingerprint: {}", config.fingerprint)?;
    writeln!(
        output,
        "tables: keywords={} phrases={} topics={} references={}",
        config.keywords.len(),
        config.phrases.len(),
        config.classifier.topics().len(),
        config.references.len()
    )?;
    let scoring = &config.scoring;
    writeln!(
        output,
        "scoring: citation_bonus={} exclusion_penalty={} min_selection_score={} max_suggestions_per_type={} child_preference_ratio={}",
        scoring.citation_bonus,
        scoring.exclusion_penalty,
        scoring.min_selection_score,
        scoring.max_suggestions_per_type,
        scoring.child_preference_ratio
    )?;
    Ok(())
}
