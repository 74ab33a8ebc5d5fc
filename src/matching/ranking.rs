use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{ManualSection, ManualType, QualityVerdict, SectionNumber};

use super::config::ScoringSettings;
use super::scoring::{MatchSignal, Matcher, PreparedCorpus, PreparedQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Selected,
    BelowThreshold,
    NegativeScore,
    ParentSuppressed,
    RedundantChild,
    ReplacedByChild,
    CapReached,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::BelowThreshold => "below_threshold",
            Self::NegativeScore => "negative_score",
            Self::ParentSuppressed => "parent_suppressed",
            Self::RedundantChild => "redundant_child",
            Self::ReplacedByChild => "replaced_by_child",
            Self::CapReached => "cap_reached",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Available,
    LowConfidence,
    Unavailable,
}

impl SuggestionStatus {
    pub fn from_verdict(verdict: QualityVerdict) -> Self {
        match verdict {
            QualityVerdict::Ok => Self::Available,
            QualityVerdict::Warning => Self::LowConfidence,
            QualityVerdict::Fail => Self::Unavailable,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::LowConfidence => "low_confidence",
            Self::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub section_number: SectionNumber,
    pub manual_type: ManualType,
    pub manual_id: String,
    pub title: String,
    pub page_number: u32,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<MatchSignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub section_number: SectionNumber,
    pub title: String,
    pub disposition: Disposition,
    pub signal: MatchSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualSuggestions {
    pub manual_type: ManualType,
    pub manual_id: String,
    pub status: SuggestionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub suggestions: Vec<Suggestion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapReferences {
    pub aip: String,
    pub gmm: String,
    pub other: String,
}

impl MapReferences {
    pub fn from_manuals(manuals: &[ManualSuggestions]) -> Self {
        let mut aip = Vec::new();
        let mut gmm = Vec::new();
        let mut other = Vec::new();

        for manual in manuals {
            for suggestion in &manual.suggestions {
                let section = suggestion.section_number.to_string();
                match manual.manual_type {
                    ManualType::Aip => aip.push(section),
                    ManualType::Gmm => gmm.push(section),
                    ManualType::Other => other.push(format!("{} {section}", manual.manual_type)),
                }
            }
        }

        Self {
            aip: aip.join("; "),
            gmm: gmm.join("; "),
            other: other.join("; "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionReport {
    pub qid: String,
    pub question_topics: Vec<String>,
    pub reference_keys: Vec<String>,
    pub reference_titles: BTreeMap<String, String>,
    pub manuals: Vec<ManualSuggestions>,
    pub map_references: MapReferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RankOptions {
    pub debug: bool,
}

/// One scored section waiting for a selection decision.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub section: &'a ManualSection,
    pub signal: MatchSignal,
}

impl Candidate<'_> {
    fn score(&self) -> f64 {
        self.signal.total_score
    }
}

/// Score descending, then section number ascending.
pub fn rank_order(left: &Candidate<'_>, right: &Candidate<'_>) -> Ordering {
    right
        .score()
        .total_cmp(&left.score())
        .then_with(|| left.section.section_number.cmp(&right.section.section_number))
}

#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub selected: Vec<Candidate<'a>>,
    pub trace: Vec<(Candidate<'a>, Disposition)>,
}

/// Picks at most `max_suggestions_per_type` candidates, preferring the most
/// specific section when a parent and one of its descendants both qualify.
pub fn select<'a>(mut candidates: Vec<Candidate<'a>>, settings: &ScoringSettings) -> Selection<'a> {
    candidates.sort_by(rank_order);

    let mut dispositions = vec![Disposition::BelowThreshold; candidates.len()];
    let mut selected = Vec::<usize>::new();

    for index in 0..candidates.len() {
        let candidate = &candidates[index];
        let score = candidate.score();
        let number = &candidate.section.section_number;

        if score < 0.0 {
            dispositions[index] = Disposition::NegativeScore;
            continue;
        }
        if score <= 0.0 || score < settings.min_selection_score {
            dispositions[index] = Disposition::BelowThreshold;
            continue;
        }

        let has_selected_descendant = selected
            .iter()
            .any(|chosen| number.is_ancestor_of(&candidates[*chosen].section.section_number));
        if has_selected_descendant {
            dispositions[index] = Disposition::ParentSuppressed;
            continue;
        }

        let ancestors = selected
            .iter()
            .copied()
            .filter(|chosen| candidates[*chosen].section.section_number.is_ancestor_of(number))
            .collect::<Vec<usize>>();
        if !ancestors.is_empty() {
            let strongest = ancestors
                .iter()
                .map(|chosen| candidates[*chosen].score())
                .fold(f64::MIN, f64::max);
            if score >= settings.child_preference_ratio * strongest {
                for replaced in &ancestors {
                    dispositions[*replaced] = Disposition::ReplacedByChild;
                }
                selected.retain(|chosen| !ancestors.contains(chosen));
                selected.push(index);
                dispositions[index] = Disposition::Selected;
            } else {
                dispositions[index] = Disposition::RedundantChild;
            }
            continue;
        }

        if selected.len() >= settings.max_suggestions_per_type {
            dispositions[index] = Disposition::CapReached;
            continue;
        }

        selected.push(index);
        dispositions[index] = Disposition::Selected;
    }

    selected.sort_unstable();
    let chosen = selected
        .iter()
        .map(|index| candidates[*index].clone())
        .collect::<Vec<Candidate<'a>>>();

    Selection {
        selected: chosen,
        trace: candidates.into_iter().zip(dispositions).collect(),
    }
}

impl Matcher {
    /// Ranks one manual for one question. A failed parse is reported as
    /// unavailable without scoring.
    pub fn suggest_for_manual(
        &self,
        question: &PreparedQuestion,
        prepared: &PreparedCorpus,
        options: RankOptions,
    ) -> ManualSuggestions {
        let corpus = &prepared.corpus;
        let status = SuggestionStatus::from_verdict(corpus.verdict());

        if status == SuggestionStatus::Unavailable {
            let reason = corpus
                .report
                .extraction_failure
                .clone()
                .or_else(|| corpus.report.issues.first().cloned())
                .unwrap_or_else(|| "manual parse failed quality checks".to_string());
            return ManualSuggestions {
                manual_type: corpus.manual_type,
                manual_id: corpus.manual_id.clone(),
                status,
                reason: Some(reason),
                suggestions: Vec::new(),
                trace: Vec::new(),
            };
        }

        let candidates = corpus
            .sections
            .iter()
            .zip(&prepared.sections)
            .map(|(section, prepared_section)| Candidate {
                section,
                signal: self.score(question, prepared_section),
            })
            .collect::<Vec<Candidate<'_>>>();

        let selection = select(candidates, &self.config().scoring);

        let suggestions = selection
            .selected
            .into_iter()
            .map(|candidate| Suggestion {
                section_number: candidate.section.section_number.clone(),
                manual_type: corpus.manual_type,
                manual_id: corpus.manual_id.clone(),
                title: candidate.section.title.clone(),
                page_number: candidate.section.page_number,
                score: candidate.signal.total_score,
                signal: options.debug.then_some(candidate.signal),
            })
            .collect();

        let trace = if options.debug {
            selection
                .trace
                .into_iter()
                .map(|(candidate, disposition)| TraceEntry {
                    section_number: candidate.section.section_number.clone(),
                    title: candidate.section.title.clone(),
                    disposition,
                    signal: candidate.signal,
                })
                .collect()
        } else {
            Vec::new()
        };

        ManualSuggestions {
            manual_type: corpus.manual_type,
            manual_id: corpus.manual_id.clone(),
            status,
            reason: (status == SuggestionStatus::LowConfidence)
                .then(|| corpus.report.issues.join("; ")),
            suggestions,
            trace,
        }
    }

    /// Full report for one question across the selected manuals, one per type.
    pub fn suggest(
        &self,
        question: &PreparedQuestion,
        manuals: &[PreparedCorpus],
        options: RankOptions,
    ) -> SuggestionReport {
        let mut per_manual = manuals
            .iter()
            .map(|prepared| self.suggest_for_manual(question, prepared, options))
            .collect::<Vec<ManualSuggestions>>();
        per_manual.sort_by(|left, right| {
            left.manual_type
                .cmp(&right.manual_type)
                .then_with(|| left.manual_id.cmp(&right.manual_id))
        });

        SuggestionReport {
            qid: question.qid.clone(),
            question_topics: question.topics().iter().cloned().collect(),
            reference_keys: question.reference_keys().to_vec(),
            reference_titles: question.reference_titles().clone(),
            map_references: MapReferences::from_manuals(&per_manual),
            manuals: per_manual,
        }
    }
}
