mod registry;
mod store;

use std::path::Path;

use crate::manual::ParsedManual;
use crate::model::{ManualCorpus, ManualType};
use crate::util::{now_utc_string, sanitize_id};

pub use registry::{CorpusRegistry, PublishOutcome, PublishReceipt};
pub use store::SnapshotStore;

const ID_HASH_CHARS: usize = 12;

/// Where a manual came from. The parser output is attached in `build_corpus`.
#[derive(Debug, Clone)]
pub struct ManualSource {
    pub manual_id: String,
    pub manual_type: ManualType,
    pub filename: String,
    pub source_path: String,
    pub sha256: String,
    pub uploaded_at: String,
}

impl ManualSource {
    pub fn new(path: &Path, manual_type: ManualType, sha256: String) -> Self {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            manual_id: manual_id_for(path, &sha256),
            manual_type,
            filename,
            source_path: path.display().to_string(),
            sha256,
            uploaded_at: now_utc_string(),
        }
    }
}

/// `<sanitized file stem>-<first 12 hex chars of the content hash>`.
pub fn manual_id_for(path: &Path, sha256: &str) -> String {
    let stem = path
        .file_stem()
        .map(|stem| sanitize_id(&stem.to_string_lossy()))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "manual".to_string());
    let digest = sha256.get(..ID_HASH_CHARS).unwrap_or(sha256);

    format!("{stem}-{digest}")
}

/// Assembles an unpublished corpus. The registry assigns the generation.
pub fn build_corpus(source: ManualSource, parsed: ParsedManual) -> ManualCorpus {
    ManualCorpus {
        manual_id: source.manual_id,
        manual_type: source.manual_type,
        filename: source.filename,
        source_path: source.source_path,
        source_sha256: source.sha256,
        version_label: parsed.version_label,
        generation: 0,
        uploaded_at: source.uploaded_at,
        parsed_at: now_utc_string(),
        sections: parsed.sections,
        report: parsed.report,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::manual::{ExtractedLine, ManualParser, ParserSettings};

    #[test]
    fn manual_id_combines_stem_and_hash_prefix() {
        let path = PathBuf::from("/uploads/ACME GMM Rev 12.pdf");
        let sha = "0123456789abcdef0123456789abcdef";
        assert_eq!(manual_id_for(&path, sha), "acme_gmm_rev_12-0123456789ab");
        assert_eq!(manual_id_for(Path::new("/uploads/---.txt"), "abc"), "manual-abc");
    }

    #[test]
    fn build_corpus_carries_parse_output() {
        let parser = ManualParser::new(&ParserSettings::default()).expect("parser");
        let parsed = parser.parse_lines(vec![
            ExtractedLine::new("6.4 AD MANAGEMENT", 1),
            ExtractedLine::new("Airworthiness directives are tracked by planning.", 1),
        ]);

        let source = ManualSource::new(Path::new("gmm.txt"), ManualType::Gmm, "f".repeat(64));
        let corpus = build_corpus(source, parsed);
        assert_eq!(corpus.manual_id, format!("gmm-{}", "f".repeat(12)));
        assert_eq!(corpus.filename, "gmm.txt");
        assert_eq!(corpus.generation, 0);
        assert_eq!(corpus.sections.len(), 1);
        assert_eq!(corpus.sections[0].title, "AD MANAGEMENT");
    }
}
