use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{ManualCorpus, ManualType, QualityVerdict};

/// Manual ids pinned per type for one audit.
pub type AuditPins = BTreeMap<ManualType, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    Published,
    Replaced,
    KeptPrevious,
}

impl PublishOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Replaced => "replaced",
            Self::KeptPrevious => "kept_previous",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub outcome: PublishOutcome,
    /// The corpus readers see for this manual id after the call.
    pub current: Arc<ManualCorpus>,
}

/// Published manuals keyed by manual id. Each corpus is immutable once
/// published; replacing one swaps the `Arc` under the write lock.
#[derive(Debug, Default)]
pub struct CorpusRegistry {
    corpora: RwLock<BTreeMap<String, Arc<ManualCorpus>>>,
    audit_pins: RwLock<BTreeMap<String, AuditPins>>,
}

impl CorpusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a fully built corpus. A failed parse never displaces an
    /// existing corpus for the same manual id.
    pub fn publish(&self, mut corpus: ManualCorpus) -> PublishReceipt {
        let mut corpora = self
            .corpora
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(previous) = corpora.get(&corpus.manual_id).cloned() else {
            corpus.generation = 1;
            let current = Arc::new(corpus);
            corpora.insert(current.manual_id.clone(), Arc::clone(&current));
            info!(
                manual_id = %current.manual_id,
                manual_type = %current.manual_type,
                sections = current.sections.len(),
                verdict = current.verdict().as_str(),
                "published manual corpus"
            );
            return PublishReceipt {
                outcome: PublishOutcome::Published,
                current,
            };
        };

        if corpus.verdict() == QualityVerdict::Fail {
            warn!(
                manual_id = %corpus.manual_id,
                generation = previous.generation,
                "reparse failed quality checks; keeping previous corpus"
            );
            return PublishReceipt {
                outcome: PublishOutcome::KeptPrevious,
                current: previous,
            };
        }

        corpus.generation = previous.generation + 1;
        corpus.uploaded_at = previous.uploaded_at.clone();
        let current = Arc::new(corpus);
        corpora.insert(current.manual_id.clone(), Arc::clone(&current));
        info!(
            manual_id = %current.manual_id,
            generation = current.generation,
            sections = current.sections.len(),
            verdict = current.verdict().as_str(),
            "replaced manual corpus"
        );

        PublishReceipt {
            outcome: PublishOutcome::Replaced,
            current,
        }
    }

    /// Inserts a previously published corpus as-is, e.g. from the snapshot cache.
    pub fn restore(&self, corpus: ManualCorpus) {
        let mut corpora = self
            .corpora
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        corpora.insert(corpus.manual_id.clone(), Arc::new(corpus));
    }

    pub fn get(&self, manual_id: &str) -> Option<Arc<ManualCorpus>> {
        self.corpora
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(manual_id)
            .cloned()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let corpora = self
            .corpora
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        RegistrySnapshot { corpora }
    }

    pub fn restore_pins(&self, pins: BTreeMap<String, AuditPins>) {
        *self
            .audit_pins
            .write()
            .unwrap_or_else(PoisonError::into_inner) = pins;
    }

    pub fn pins(&self) -> BTreeMap<String, AuditPins> {
        self.audit_pins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the audit's pins, recording the current latest manual of each
    /// type on first use. The flag is true when new pins were recorded.
    pub fn pin_for_audit(&self, audit_id: &str, snapshot: &RegistrySnapshot) -> (AuditPins, bool) {
        let mut pins = self
            .audit_pins
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = pins.get(audit_id) {
            return (existing.clone(), false);
        }

        let recorded = snapshot
            .latest_by_type()
            .into_iter()
            .map(|(manual_type, corpus)| (manual_type, corpus.manual_id.clone()))
            .collect::<AuditPins>();
        info!(audit_id, pinned = recorded.len(), "pinned manuals for audit");
        pins.insert(audit_id.to_string(), recorded.clone());
        (recorded, true)
    }
}

/// A consistent read-only view of the registry at one instant.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    corpora: BTreeMap<String, Arc<ManualCorpus>>,
}

impl RegistrySnapshot {
    pub fn get(&self, manual_id: &str) -> Option<&Arc<ManualCorpus>> {
        self.corpora.get(manual_id)
    }

    pub fn len(&self) -> usize {
        self.corpora.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpora.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ManualCorpus>> {
        self.corpora.values()
    }

    /// Most recently uploaded corpus of each type; ties go to the larger id.
    pub fn latest_by_type(&self) -> BTreeMap<ManualType, Arc<ManualCorpus>> {
        let mut latest = BTreeMap::<ManualType, Arc<ManualCorpus>>::new();
        for corpus in self.corpora.values() {
            let newer = latest.get(&corpus.manual_type).is_none_or(|current| {
                (&corpus.uploaded_at, &corpus.manual_id)
                    > (&current.uploaded_at, &current.manual_id)
            });
            if newer {
                latest.insert(corpus.manual_type, Arc::clone(corpus));
            }
        }
        latest
    }

    /// Latest manuals with pinned ids substituted where the pinned corpus is
    /// still present.
    pub fn select_for_audit(&self, pins: &AuditPins) -> BTreeMap<ManualType, Arc<ManualCorpus>> {
        let mut selected = self.latest_by_type();
        for (manual_type, manual_id) in pins {
            match self.corpora.get(manual_id) {
                Some(corpus) => {
                    selected.insert(*manual_type, Arc::clone(corpus));
                }
                None => warn!(
                    manual_type = %manual_type,
                    manual_id = %manual_id,
                    "pinned manual is no longer available; using latest"
                ),
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::model::{ManualSection, ParseMetrics, ParseQualityReport, SectionNumber};

    const JAN: &str = "2026-01-01T00:00:00Z";
    const MID_JAN: &str = "2026-01-15T00:00:00Z";
    const FEB: &str = "2026-02-01T00:00:00Z";
    const MAR: &str = "2026-03-01T00:00:00Z";

    fn corpus(
        id: &str,
        manual_type: ManualType,
        uploaded_at: &str,
        titles: &[&str],
    ) -> ManualCorpus {
        ManualCorpus {
            manual_id: id.to_string(),
            manual_type,
            filename: format!("{id}.txt"),
            source_path: format!("/manuals/{id}.txt"),
            source_sha256: "0".repeat(64),
            version_label: None,
            generation: 0,
            uploaded_at: uploaded_at.to_string(),
            parsed_at: uploaded_at.to_string(),
            sections: titles
                .iter()
                .enumerate()
                .map(|(index, title)| ManualSection {
                    section_number: SectionNumber::from_components(vec![6, index as u32 + 1])
                        .expect("number"),
                    parent_number: None,
                    title: title.to_string(),
                    body_text: String::new(),
                    page_number: 1,
                    citations: Vec::new(),
                })
                .collect(),
            report: ParseQualityReport {
                verdict: QualityVerdict::Ok,
                extraction_failure: None,
                issues: Vec::new(),
                metrics: ParseMetrics::default(),
            },
        }
    }

    fn failed(id: &str, manual_type: ManualType, uploaded_at: &str) -> ManualCorpus {
        let mut corpus = corpus(id, manual_type, uploaded_at, &[]);
        corpus.report.verdict = QualityVerdict::Fail;
        corpus
    }

    #[test]
    fn snapshot_taken_before_replace_keeps_old_sections() {
        let registry = CorpusRegistry::new();
        let first = registry.publish(corpus("gmm", ManualType::Gmm, JAN, &["Old"]));
        assert_eq!(first.outcome, PublishOutcome::Published);
        assert_eq!(first.current.generation, 1);

        let before = registry.snapshot();
        let second = registry.publish(corpus("gmm", ManualType::Gmm, MAR, &["New", "Newer"]));
        assert_eq!(second.outcome, PublishOutcome::Replaced);
        assert_eq!(second.current.generation, 2);
        assert_eq!(second.current.uploaded_at, JAN);

        let old = before.get("gmm").expect("old corpus");
        assert_eq!(old.sections.len(), 1);
        assert_eq!(old.sections[0].title, "Old");
        let new = registry.get("gmm").expect("new corpus");
        assert_eq!(new.sections.len(), 2);
    }

    #[test]
    fn failed_reparse_keeps_previous_corpus() {
        let registry = CorpusRegistry::new();
        registry.publish(corpus("aip", ManualType::Aip, JAN, &["Kept"]));

        let receipt = registry.publish(failed("aip", ManualType::Aip, JAN));
        assert_eq!(receipt.outcome, PublishOutcome::KeptPrevious);
        assert_eq!(receipt.current.sections[0].title, "Kept");
        assert_eq!(registry.get("aip").expect("aip").generation, 1);
    }

    #[test]
    fn failed_first_upload_is_still_published() {
        let registry = CorpusRegistry::new();
        let receipt = registry.publish(failed("aip", ManualType::Aip, JAN));
        assert_eq!(receipt.outcome, PublishOutcome::Published);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn latest_by_type_uses_upload_time() {
        let registry = CorpusRegistry::new();
        registry.publish(corpus("gmm-a", ManualType::Gmm, JAN, &["A"]));
        registry.publish(corpus("gmm-b", ManualType::Gmm, FEB, &["B"]));
        registry.publish(corpus("aip-a", ManualType::Aip, MID_JAN, &["C"]));

        let latest = registry.snapshot().latest_by_type();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[&ManualType::Gmm].manual_id, "gmm-b");
        assert_eq!(latest[&ManualType::Aip].manual_id, "aip-a");
    }

    #[test]
    fn audit_pins_survive_later_uploads() {
        let registry = CorpusRegistry::new();
        registry.publish(corpus("gmm-a", ManualType::Gmm, JAN, &["A"]));

        let (pins, created) = registry.pin_for_audit("audit-1", &registry.snapshot());
        assert!(created);
        assert_eq!(pins[&ManualType::Gmm], "gmm-a");

        registry.publish(corpus("gmm-b", ManualType::Gmm, FEB, &["B"]));
        let snapshot = registry.snapshot();
        let (pins, created) = registry.pin_for_audit("audit-1", &snapshot);
        assert!(!created);

        let selected = snapshot.select_for_audit(&pins);
        assert_eq!(selected[&ManualType::Gmm].manual_id, "gmm-a");
        assert_eq!(snapshot.latest_by_type()[&ManualType::Gmm].manual_id, "gmm-b");
    }

    #[test]
    fn readers_on_other_threads_see_whole_corpora() {
        let registry = CorpusRegistry::new();
        registry.publish(corpus("gmm", ManualType::Gmm, JAN, &["v1"]));

        thread::scope(|scope| {
            let writer = scope.spawn(|| {
                for round in 0..50 {
                    let titles = vec!["v2"; round % 3 + 1];
                    registry.publish(corpus("gmm", ManualType::Gmm, JAN, &titles));
                }
            });
            for _ in 0..50 {
                let snapshot = registry.snapshot();
                let current = snapshot.get("gmm").expect("corpus");
                let first = current.sections[0].title.clone();
                assert!(current.sections.iter().all(|section| section.title == first));
            }
            writer.join().expect("writer thread");
        });

        assert_eq!(registry.get("gmm").expect("gmm").generation, 51);
    }
}
