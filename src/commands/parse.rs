use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::ParseArgs;
use crate::corpus::{ManualSource, SnapshotStore};
use crate::matching::MatchConfig;
use crate::model::ManualType;
use crate::util::sha256_file;

use super::{ParseRun, parse_and_publish, push_config_flag, push_extraction_flags};

pub fn run(args: ParseArgs) -> Result<()> {
    if !args.path.is_file() {
        bail!("manual source not found: {}", args.path.display());
    }

    let config = MatchConfig::load_or_builtin(args.config.as_deref())?;
    let store = SnapshotStore::new(&args.cache_root);
    let registry = store
        .load_registry()
        .with_context(|| format!("failed to load corpus cache {}", args.cache_root.display()))?;

    let manual_type = ManualType::from_label(&args.manual_type);
    let sha256 = sha256_file(&args.path)?;
    let source = ManualSource::new(&args.path, manual_type, sha256);
    info!(
        path = %args.path.display(),
        manual_id = %source.manual_id,
        manual_type = %manual_type,
        config_version = %config.version,
        "parsing manual upload"
    );

    parse_and_publish(
        ParseRun {
            command: "parse",
            rendered_command: render_parse_command(&args),
            store: &store,
            registry: &registry,
            config: &config,
            extraction: &args.extraction,
        },
        source,
    )?;

    Ok(())
}

fn render_parse_command(args: &ParseArgs) -> String {
    let mut command = vec![
        "dctmap".to_string(),
        "parse".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
        "--manual-type".to_string(),
        args.manual_type.clone(),
    ];
    push_config_flag(&mut command, args.config.as_deref());
    push_extraction_flags(&mut command, &args.extraction);
    command.push(args.path.display().to_string());

    command.join(" ")
}
