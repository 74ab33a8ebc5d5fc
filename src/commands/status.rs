use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::corpus::SnapshotStore;

pub fn run(args: StatusArgs) -> Result<()> {
    let store = SnapshotStore::new(&args.cache_root);
    info!(cache_root = %args.cache_root.display(), "status requested");

    if !store.corpora_dir().exists() {
        warn!(path = %store.corpora_dir().display(), "corpus cache missing");
        return Ok(());
    }

    let registry = store
        .load_registry()
        .with_context(|| format!("failed to load corpus cache {}", args.cache_root.display()))?;
    let snapshot = registry.snapshot();

    for corpus in snapshot.iter() {
        let metrics = &corpus.report.metrics;
        info!(
            manual_id = %corpus.manual_id,
            manual_type = %corpus.manual_type,
            filename = %corpus.filename,
            version_label = %corpus.version_label.clone().unwrap_or_default(),
            generation = corpus.generation,
            uploaded_at = %corpus.uploaded_at,
            parsed_at = %corpus.parsed_at,
            sections = corpus.sections.len(),
            pages = metrics.page_count,
            orphans = metrics.orphan_section_count,
            verdict = corpus.verdict().as_str(),
            issues = %corpus.report.issues.join("; "),
            "cached manual corpus"
        );
    }

    for (manual_type, corpus) in snapshot.latest_by_type() {
        info!(
            manual_type = %manual_type,
            manual_id = %corpus.manual_id,
            "latest manual for type"
        );
    }

    let pins = registry.pins();
    for (audit_id, pinned) in &pins {
        let rendered = pinned
            .iter()
            .map(|(manual_type, manual_id)| format!("{manual_type}={manual_id}"))
            .collect::<Vec<String>>()
            .join(", ");
        info!(audit_id = %audit_id, pins = %rendered, "audit pins");
    }

    info!(
        corpora = snapshot.len(),
        audits = pins.len(),
        "status complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_on_empty_cache_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        run(StatusArgs {
            cache_root: dir.path().join("missing"),
        })
        .expect("status should not fail on a fresh cache");
    }
}
