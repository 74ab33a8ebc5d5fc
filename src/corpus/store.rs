use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::error::CorpusError;
use crate::model::{ManualCorpus, ParseRunManifest};
use crate::util::{ensure_directory, write_json_atomic, write_json_pretty};

use super::registry::{AuditPins, CorpusRegistry};

const CORPORA_DIR: &str = "corpora";
const MANIFESTS_DIR: &str = "manifests";
const AUDIT_PINS_FILE: &str = "audit_pins.json";

/// On-disk snapshots of published corpora under a cache root.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn corpora_dir(&self) -> PathBuf {
        self.root.join(CORPORA_DIR)
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join(MANIFESTS_DIR)
    }

    pub fn corpus_path(&self, manual_id: &str) -> PathBuf {
        self.corpora_dir().join(format!("{manual_id}.json"))
    }

    pub fn save(&self, corpus: &ManualCorpus) -> Result<PathBuf> {
        let path = self.corpus_path(&corpus.manual_id);
        ensure_directory(&self.corpora_dir())?;
        write_json_atomic(&path, corpus)?;
        debug!(manual_id = %corpus.manual_id, path = %path.display(), "saved corpus snapshot");
        Ok(path)
    }

    pub fn load(&self, manual_id: &str) -> Result<Option<ManualCorpus>> {
        let path = self.corpus_path(manual_id);
        if !path.exists() {
            return Ok(None);
        }

        let corpus = read_snapshot(&path)?;
        if corpus.manual_id != manual_id {
            return Err(CorpusError::IdMismatch {
                path: path.display().to_string(),
                expected: manual_id.to_string(),
                found: corpus.manual_id,
            }
            .into());
        }
        Ok(Some(corpus))
    }

    /// Every snapshot in the cache, ordered by manual id. Temp files left by
    /// an interrupted write are skipped.
    pub fn load_all(&self) -> Result<Vec<ManualCorpus>> {
        let dir = self.corpora_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|source| CorpusError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CorpusError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_none_or(|name| name.starts_with('.'));
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            if !hidden && is_json {
                paths.push(path);
            }
        }
        paths.sort();

        paths.iter().map(|path| read_snapshot(path)).collect()
    }

    pub fn load_registry(&self) -> Result<CorpusRegistry> {
        let registry = CorpusRegistry::new();
        for corpus in self.load_all()? {
            registry.restore(corpus);
        }
        registry.restore_pins(self.load_pins()?);
        Ok(registry)
    }

    pub fn pins_path(&self) -> PathBuf {
        self.manifests_dir().join(AUDIT_PINS_FILE)
    }

    pub fn load_pins(&self) -> Result<BTreeMap<String, AuditPins>> {
        let path = self.pins_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let raw = fs::read(&path).map_err(|source| CorpusError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_slice(&raw)
            .map_err(|source| CorpusError::Decode {
                path: path.display().to_string(),
                source,
            })
            .with_context(|| format!("audit pins at {} are unreadable", path.display()))
    }

    pub fn save_pins(&self, pins: &BTreeMap<String, AuditPins>) -> Result<()> {
        ensure_directory(&self.manifests_dir())?;
        write_json_atomic(&self.pins_path(), pins)
    }

    pub fn write_manifest(&self, manifest: &ParseRunManifest) -> Result<PathBuf> {
        let path = self.manifests_dir().join(format!(
            "parse_{}_{}.json",
            manifest.manual_id, manifest.run_id
        ));
        write_json_pretty(&path, manifest)?;
        Ok(path)
    }
}

fn read_snapshot(path: &Path) -> Result<ManualCorpus> {
    let raw = fs::read(path).map_err(|source| CorpusError::Io {
        path: path.display().to_string(),
        source,
    })?;
    match serde_json::from_slice(&raw) {
        Ok(corpus) => Ok(corpus),
        Err(source) => {
            warn!(path = %path.display(), "corpus snapshot failed to decode");
            Err(CorpusError::Decode {
                path: path.display().to_string(),
                source,
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ManualSection, ManualType, ParseMetrics, ParseQualityReport, QualityVerdict,
        SectionNumber,
    };

    fn corpus(id: &str, manual_type: ManualType) -> ManualCorpus {
        ManualCorpus {
            manual_id: id.to_string(),
            manual_type,
            filename: format!("{id}.txt"),
            source_path: format!("/manuals/{id}.txt"),
            source_sha256: "a".repeat(64),
            version_label: Some("12".to_string()),
            generation: 1,
            uploaded_at: "2026-01-01T00:00:00Z".to_string(),
            parsed_at: "2026-01-01T00:00:05Z".to_string(),
            sections: vec![ManualSection {
                section_number: SectionNumber::parse("6.4.12").expect("number"),
                parent_number: SectionNumber::parse("6.4"),
                title: "AD Tracking".to_string(),
                body_text: "See 14 CFR 121.369.".to_string(),
                page_number: 3,
                citations: vec!["14 CFR 121.369".to_string()],
            }],
            report: ParseQualityReport {
                verdict: QualityVerdict::Warning,
                extraction_failure: None,
                issues: vec!["only 1 sections detected".to_string()],
                metrics: ParseMetrics::default(),
            },
        }
    }

    #[test]
    fn saved_corpus_loads_back_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let original = corpus("gmm-abc", ManualType::Gmm);

        let path = store.save(&original).expect("save");
        assert_eq!(path, dir.path().join("corpora").join("gmm-abc.json"));

        let loaded = store.load("gmm-abc").expect("load").expect("present");
        assert_eq!(loaded, original);
        assert!(store.load("missing").expect("load missing").is_none());
    }

    #[test]
    fn load_all_skips_temp_files_and_sorts_by_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        store.save(&corpus("gmm-b", ManualType::Gmm)).expect("save b");
        store.save(&corpus("aip-a", ManualType::Aip)).expect("save a");
        fs::write(store.corpora_dir().join(".gmm-c.json.tmp"), b"{").expect("temp");
        fs::write(store.corpora_dir().join("notes.txt"), b"ignored").expect("notes");

        let ids = store
            .load_all()
            .expect("load all")
            .into_iter()
            .map(|corpus| corpus.manual_id)
            .collect::<Vec<String>>();
        assert_eq!(ids, vec!["aip-a", "gmm-b"]);
    }

    #[test]
    fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        ensure_directory(&store.corpora_dir()).expect("dir");
        fs::write(store.corpus_path("broken"), b"{ not json").expect("write");

        let err = store.load_all().expect_err("corrupt snapshot must fail");
        assert!(err.to_string().contains("failed to decode corpus snapshot"));
    }

    #[test]
    fn registry_and_pins_restore_from_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        store.save(&corpus("gmm-b", ManualType::Gmm)).expect("save");

        let registry = store.load_registry().expect("registry");
        let (pins, created) = registry.pin_for_audit("audit-7", &registry.snapshot());
        assert!(created);
        store.save_pins(&registry.pins()).expect("save pins");

        let reloaded = store.load_registry().expect("reload");
        assert_eq!(reloaded.pins().get("audit-7"), Some(&pins));
        assert_eq!(reloaded.get("gmm-b").expect("corpus").generation, 1);
    }
}
