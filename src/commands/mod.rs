pub mod check_config;
pub mod parse;
pub mod reparse;
pub mod status;
pub mod suggest;

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ExtractionArgs;
use crate::corpus::{
    CorpusRegistry, ManualSource, PublishOutcome, PublishReceipt, SnapshotStore, build_corpus,
};
use crate::manual::ManualParser;
use crate::manual::extract::{TextExtractor, extract_outcome, extractor_for};
use crate::matching::MatchConfig;
use crate::model::ParseRunManifest;
use crate::util::{now_utc_string, utc_compact_string};

const PARSE_MANIFEST_VERSION: u32 = 1;

/// Everything one parse or reparse run needs besides the source itself.
pub(crate) struct ParseRun<'a> {
    pub command: &'static str,
    pub rendered_command: String,
    pub store: &'a SnapshotStore,
    pub registry: &'a CorpusRegistry,
    pub config: &'a MatchConfig,
    pub extraction: &'a ExtractionArgs,
}

/// Extracts, parses and publishes one manual, then records the outcome in the
/// snapshot cache and a parse manifest.
pub(crate) fn parse_and_publish(run: ParseRun<'_>, source: ManualSource) -> Result<PublishReceipt> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let source_path = Path::new(&source.source_path).to_path_buf();
    let extractor = extractor_for(
        &source_path,
        Duration::from_secs(run.extraction.timeout_secs),
        run.extraction.max_pages,
    );
    info!(
        command = run.command,
        run_id = %run_id,
        manual_id = %source.manual_id,
        manual_type = %source.manual_type,
        extractor = extractor.name(),
        "starting manual parse"
    );

    let parser = ManualParser::new(&run.config.parser).context("failed to build manual parser")?;
    let parsed = parser.parse(extract_outcome(extractor.as_ref(), &source_path));
    let corpus = build_corpus(source, parsed);

    let report = corpus.report.clone();
    let version_label = corpus.version_label.clone();
    let manual_id = corpus.manual_id.clone();
    let manual_type = corpus.manual_type;
    let source_sha256 = corpus.source_sha256.clone();

    let receipt = run.registry.publish(corpus);
    if receipt.outcome != PublishOutcome::KeptPrevious {
        run.store.save(&receipt.current)?;
    } else {
        warn!(
            manual_id = %manual_id,
            issues = %report.issues.join("; "),
            "parse failed; the cached corpus was left unchanged"
        );
    }

    let manifest = ParseRunManifest {
        manifest_version: PARSE_MANIFEST_VERSION,
        run_id,
        command: run.rendered_command,
        manual_id,
        manual_type,
        source_path: source_path.display().to_string(),
        source_sha256,
        extractor: extractor.name().to_string(),
        config_version: run.config.version.clone(),
        config_fingerprint: run.config.fingerprint.clone(),
        started_at,
        completed_at: now_utc_string(),
        publish_outcome: receipt.outcome.as_str().to_string(),
        generation: receipt.current.generation,
        version_label,
        report,
    };
    let manifest_path = run.store.write_manifest(&manifest)?;

    info!(
        manual_id = %manifest.manual_id,
        outcome = receipt.outcome.as_str(),
        generation = receipt.current.generation,
        sections = receipt.current.sections.len(),
        verdict = manifest.report.verdict.as_str(),
        manifest = %manifest_path.display(),
        "manual parse finished"
    );

    write_receipt_summary(&mut io::stdout().lock(), &receipt, &manifest)?;
    Ok(receipt)
}

fn write_receipt_summary<W: Write>(
    output: &mut W,
    receipt: &PublishReceipt,
    manifest: &ParseRunManifest,
) -> Result<()> {
    let current = &receipt.current;
    writeln!(
        output,
        "{} {} ({}) generation={} sections={} verdict={}",
        receipt.outcome.as_str(),
        current.manual_id,
        current.manual_type,
        current.generation,
        current.sections.len(),
        current.verdict().as_str(),
    )?;
    for issue in &manifest.report.issues {
        writeln!(output, "  issue: {issue}")?;
    }
    if let Some(reason) = &manifest.report.extraction_failure {
        writeln!(output, "  extraction failure: {reason}")?;
    }
    output.flush()?;
    Ok(())
}

fn push_extraction_flags(command: &mut Vec<String>, extraction: &ExtractionArgs) {
    command.push("--timeout-secs".to_string());
    command.push(extraction.timeout_secs.to_string());
    if let Some(max_pages) = extraction.max_pages {
        command.push("--max-pages".to_string());
        command.push(max_pages.to_string());
    }
}

fn push_config_flag(command: &mut Vec<String>, config: Option<&Path>) {
    if let Some(path) = config {
        command.push("--config".to_string());
        command.push(path.display().to_string());
    }
}
