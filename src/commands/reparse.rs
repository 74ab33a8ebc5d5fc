use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::ReparseArgs;
use crate::corpus::{ManualSource, SnapshotStore};
use crate::matching::MatchConfig;
use crate::util::sha256_file;

use super::{ParseRun, parse_and_publish, push_config_flag, push_extraction_flags};

pub fn run(args: ReparseArgs) -> Result<()> {
    let config = MatchConfig::load_or_builtin(args.config.as_deref())?;
    let store = SnapshotStore::new(&args.cache_root);
    let registry = store
        .load_registry()
        .with_context(|| format!("failed to load corpus cache {}", args.cache_root.display()))?;

    let Some(existing) = registry.get(&args.manual_id) else {
        bail!(
            "manual '{}' is not in the corpus cache at {}",
            args.manual_id,
            args.cache_root.display()
        );
    };

    let source_path = PathBuf::from(&existing.source_path);
    if !source_path.is_file() {
        bail!(
            "source for manual '{}' is no longer available at {}",
            existing.manual_id,
            source_path.display()
        );
    }

    let sha256 = sha256_file(&source_path)?;
    if sha256 != existing.source_sha256 {
        warn!(
            manual_id = %existing.manual_id,
            recorded = %existing.source_sha256,
            current = %sha256,
            "source file changed since it was uploaded"
        );
    }
    info!(
        manual_id = %existing.manual_id,
        generation = existing.generation,
        config_version = %config.version,
        "reparsing manual"
    );

    let source = ManualSource {
        manual_id: existing.manual_id.clone(),
        manual_type: existing.manual_type,
        filename: existing.filename.clone(),
        source_path: existing.source_path.clone(),
        sha256,
        uploaded_at: existing.uploaded_at.clone(),
    };

    parse_and_publish(
        ParseRun {
            command: "reparse",
            rendered_command: render_reparse_command(&args),
            store: &store,
            registry: &registry,
            config: &config,
            extraction: &args.extraction,
        },
        source,
    )?;

    Ok(())
}

fn render_reparse_command(args: &ReparseArgs) -> String {
    let mut command = vec![
        "dctmap".to_string(),
        "reparse".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];
    push_config_flag(&mut command, args.config.as_deref());
    push_extraction_flags(&mut command, &args.extraction);
    command.push(args.manual_id.clone());

    command.join(" ")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::cli::{ExtractionArgs, ParseArgs};
    use crate::commands::parse;

    const MANUAL_TEXT: &str = "6.4 Airworthiness Directives\n\
        This section covers how airworthiness directives are received and reviewed by engineering.\n\
        6.4.1 AD Management Process\n\
        Recurring ADs are tracked by planning per 14 CFR 121.369 and reviewed monthly by quality.\n\
        6.4.2 AD Compliance Records\n\
        Compliance records for each AD are retained in the maintenance records system for audit.\n";

    fn extraction() -> ExtractionArgs {
        ExtractionArgs {
            timeout_secs: 5,
            max_pages: None,
        }
    }

    fn reparse_args(cache_root: PathBuf, manual_id: String) -> ReparseArgs {
        ReparseArgs {
            cache_root,
            config: None,
            extraction: extraction(),
            manual_id,
        }
    }

    fn upload(dir: &std::path::Path) -> (PathBuf, PathBuf, String) {
        let source = dir.join("gmm.txt");
        fs::write(&source, MANUAL_TEXT).expect("write manual");
        let cache_root = dir.join("cache");
        parse::run(ParseArgs {
            cache_root: cache_root.clone(),
            config: None,
            manual_type: "GMM".to_string(),
            extraction: extraction(),
            path: source.clone(),
        })
        .expect("initial parse");

        let manual_id = SnapshotStore::new(&cache_root)
            .load_all()
            .expect("load")
            .remove(0)
            .manual_id;
        (source, cache_root, manual_id)
    }

    #[test]
    fn reparse_replaces_corpus_and_bumps_generation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (source, cache_root, manual_id) = upload(dir.path());

        let extended = format!(
            "{MANUAL_TEXT}6.4.3 AD Sampling\nQuality samples completed AD packages every quarter for accuracy.\n"
        );
        fs::write(&source, extended).expect("rewrite manual");
        run(reparse_args(cache_root.clone(), manual_id.clone())).expect("reparse");

        let corpus = SnapshotStore::new(&cache_root)
            .load(&manual_id)
            .expect("load")
            .expect("present");
        assert_eq!(corpus.generation, 2);
        assert_eq!(corpus.sections.len(), 4);
    }

    #[test]
    fn failed_reparse_keeps_cached_corpus() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (source, cache_root, manual_id) = upload(dir.path());

        fs::write(&source, "").expect("truncate manual");
        run(reparse_args(cache_root.clone(), manual_id.clone())).expect("reparse still reports");

        let corpus = SnapshotStore::new(&cache_root)
            .load(&manual_id)
            .expect("load")
            .expect("present");
        assert_eq!(corpus.generation, 1);
        assert_eq!(corpus.sections.len(), 3);
    }

    #[test]
    fn reparse_of_unknown_manual_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run(reparse_args(dir.path().join("cache"), "nope".to_string()))
            .expect_err("unknown id");
        assert!(err.to_string().contains("not in the corpus cache"));
    }
}
