use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{OutputFormat, SuggestArgs};
use crate::corpus::{CorpusRegistry, SnapshotStore};
use crate::matching::{
    Matcher, MatchConfig, PreparedCorpus, RankOptions, SuggestionReport, default_worker_count,
    suggest_batch,
};
use crate::model::{ManualCorpus, ManualType, Question};
use crate::util::read_json;

pub fn run(args: SuggestArgs) -> Result<()> {
    let config = Arc::new(MatchConfig::load_or_builtin(args.config.as_deref())?);
    let matcher = Matcher::new(Arc::clone(&config))?;

    let questions: Vec<Question> = read_json(&args.questions)
        .with_context(|| format!("failed to load questions from {}", args.questions.display()))?;

    let store = SnapshotStore::new(&args.cache_root);
    let registry = store
        .load_registry()
        .with_context(|| format!("failed to load corpus cache {}", args.cache_root.display()))?;
    let manuals = select_manuals(&store, &registry, args.audit.as_deref())?;
    if manuals.is_empty() {
        warn!(
            cache_root = %args.cache_root.display(),
            "no parsed manuals available; every suggestion list will be empty"
        );
    }

    let prepared = manuals
        .into_values()
        .map(|corpus| matcher.prepare_corpus(corpus))
        .collect::<Vec<PreparedCorpus>>();
    let workers = args.workers.unwrap_or_else(default_worker_count);

    info!(
        questions = questions.len(),
        manuals = prepared.len(),
        workers,
        config_version = %config.version,
        config_fingerprint = %config.fingerprint,
        "scoring questions"
    );

    let reports = suggest_batch(
        &matcher,
        &questions,
        &prepared,
        RankOptions { debug: args.debug },
        workers,
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    match args.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut output, &reports)
                .context("failed to serialize suggestion json output")?;
            writeln!(output)?;
        }
        OutputFormat::Text => write_text_reports(&mut output, &reports)?,
    }
    output.flush()?;

    let with_suggestions = reports
        .iter()
        .filter(|report| report.manuals.iter().any(|manual| !manual.suggestions.is_empty()))
        .count();
    info!(
        questions = reports.len(),
        with_suggestions,
        "suggestions written"
    );
    Ok(())
}

/// Latest manual of each type, or the audit's pinned manuals. Pins are
/// recorded and saved the first time an audit id is seen.
fn select_manuals(
    store: &SnapshotStore,
    registry: &CorpusRegistry,
    audit: Option<&str>,
) -> Result<BTreeMap<ManualType, Arc<ManualCorpus>>> {
    let snapshot = registry.snapshot();
    let Some(audit_id) = audit else {
        return Ok(snapshot.latest_by_type());
    };

    let (pins, created) = registry.pin_for_audit(audit_id, &snapshot);
    if created {
        store.save_pins(&registry.pins())?;
    }
    Ok(snapshot.select_for_audit(&pins))
}

fn write_text_reports<W: Write>(output: &mut W, reports: &[SuggestionReport]) -> Result<()> {
    for report in reports {
        writeln!(output, "Question {}", report.qid)?;
        if !report.question_topics.is_empty() {
            writeln!(output, "  topics: {}", report.question_topics.join(", "))?;
        }
        if !report.reference_keys.is_empty() {
            let references = report
                .reference_keys
                .iter()
                .map(|key| match report.reference_titles.get(key) {
                    Some(title) => format!("{key} ({title})"),
                    None => key.clone(),
                })
                .collect::<Vec<String>>();
            writeln!(output, "  references: {}", references.join(", "))?;
        }

        for manual in &report.manuals {
            writeln!(
                output,
                "  {} {} [{}]",
                manual.manual_type,
                manual.manual_id,
                manual.status.as_str()
            )?;
            if let Some(reason) = &manual.reason {
                writeln!(output, "    note: {reason}")?;
            }
            if manual.suggestions.is_empty() {
                writeln!(output, "    no matching sections")?;
            }
            for suggestion in &manual.suggestions {
                writeln!(
                    output,
                    "    {} {} (page {}, score {:.2})",
                    suggestion.section_number,
                    suggestion.title,
                    suggestion.page_number,
                    suggestion.score
                )?;
            }
            for entry in &manual.trace {
                writeln!(
                    output,
                    "      trace {} {} score={:.2} keywords={} phrases={}",
                    entry.section_number,
                    entry.disposition.as_str(),
                    entry.signal.total_score,
                    entry.signal.keyword_hits.len(),
                    entry.signal.phrase_hits.len()
                )?;
            }
        }

        let map = &report.map_references;
        writeln!(
            output,
            "  MAP: AIP=[{}] GMM=[{}] Other=[{}]",
            map.aip, map.gmm, map.other
        )?;
    }
    Ok(())
}
