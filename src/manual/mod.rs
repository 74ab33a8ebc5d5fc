pub mod extract;
mod headings;
mod inline;
mod normalize;
mod quality;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::citation::CitationExtractor;
use crate::model::{ManualSection, ParseMetrics, ParseQualityReport, SectionNumber};
use crate::util::condense_whitespace;

pub use extract::{ExtractedLine, ExtractionOutcome};
use headings::HeadingMatcher;
pub use quality::QualityThresholds;

use inline::{DraftSection, InlineSubsectionSplitter};
use normalize::{NormalizationCounts, RevisionFilter};

const FALLBACK_SECTION_NUMBER: u32 = 0;
const FALLBACK_SECTION_TITLE: &str = "Manual Text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserSettings {
    pub revision_verbs: Vec<String>,
    pub revision_markers: Vec<String>,
    pub max_title_chars: usize,
    pub thresholds: QualityThresholds,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            revision_verbs: [
                "Revised",
                "Added",
                "Deleted",
                "Removed",
                "Updated",
                "Changed",
                "Modified",
                "Replaced",
                "Inserted",
                "Amended",
                "Corrected",
                "Reformatted",
            ]
            .iter()
            .map(|verb| verb.to_string())
            .collect(),
            revision_markers: vec!["=to=".to_string()],
            max_title_chars: 140,
            thresholds: QualityThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedManual {
    pub sections: Vec<ManualSection>,
    pub report: ParseQualityReport,
    pub version_label: Option<String>,
}

#[derive(Debug)]
pub struct ManualParser {
    headings: HeadingMatcher,
    revisions: RevisionFilter,
    splitter: InlineSubsectionSplitter,
    citations: CitationExtractor,
    version_label: Regex,
    thresholds: QualityThresholds,
}

impl ManualParser {
    pub fn new(settings: &ParserSettings) -> Result<Self> {
        Ok(Self {
            headings: HeadingMatcher::new(settings.max_title_chars)?,
            revisions: RevisionFilter::new(&settings.revision_verbs, &settings.revision_markers),
            splitter: InlineSubsectionSplitter::new()?,
            citations: CitationExtractor::new()?,
            version_label: Regex::new(
                r"(?i)\b(?:revision|version|rev\.)\s*(?:no\.?\s*|number\s*)?:?\s*(\d[\w.\-]*)",
            )
            .context("failed to compile version label regex")?,
            thresholds: settings.thresholds.clone(),
        })
    }

    /// Never fails: extraction problems and weak structure are reported in the
    /// quality report instead.
    pub fn parse(&self, outcome: ExtractionOutcome) -> ParsedManual {
        match outcome {
            ExtractionOutcome::Lines(lines) => self.parse_lines(lines),
            ExtractionOutcome::Failed(reason) => ParsedManual {
                sections: Vec::new(),
                report: quality::failed_report(reason, ParseMetrics::default()),
                version_label: None,
            },
        }
    }

    pub fn parse_lines(&self, lines: Vec<ExtractedLine>) -> ParsedManual {
        let mut metrics = ParseMetrics {
            page_count: lines
                .iter()
                .map(|line| line.page)
                .collect::<BTreeSet<u32>>()
                .len(),
            line_count: lines.len(),
            non_whitespace_chars: lines
                .iter()
                .map(|line| line.text.chars().filter(|ch| !ch.is_whitespace()).count())
                .sum(),
            ..ParseMetrics::default()
        };
        let version_label = self.detect_version_label(&lines);

        let (lines, counts) = self.normalize(lines);
        metrics.header_footer_lines_removed = counts.header_footer_lines_removed;
        metrics.revision_lines_dropped = counts.revision_lines_dropped;
        metrics.toc_lines_dropped = counts.toc_lines_dropped;
        metrics.dehyphenation_merges = counts.dehyphenation_merges;

        let candidates = self.collect_candidates(&lines);
        let drafts = if candidates.is_empty() {
            let fallback = self.fallback_draft(&lines);
            metrics.fallback_section_used = fallback.is_some();
            fallback.into_iter().collect::<Vec<DraftSection>>()
        } else {
            let (merged, merged_count) = merge_adjacent_headings(candidates);
            metrics.merged_heading_count = merged_count;
            let (unique, duplicate_count) = fold_duplicate_numbers(merged);
            metrics.duplicate_heading_count = duplicate_count;
            let (recovered, recovered_count) = self.splitter.recover(unique);
            metrics.inline_subsections_recovered = recovered_count;
            recovered
        };

        let sections = self.link_sections(drafts);
        let report = quality::assess(&sections, metrics, &self.thresholds);

        ParsedManual {
            sections,
            report,
            version_label,
        }
    }

    fn normalize(&self, lines: Vec<ExtractedLine>) -> (Vec<ExtractedLine>, NormalizationCounts) {
        let mut counts = NormalizationCounts::default();

        let (lines, removed) = normalize::strip_repeated_edge_lines(lines, |text| {
            self.headings.detect(text).is_some()
        });
        counts.header_footer_lines_removed = removed;

        let mut kept = Vec::with_capacity(lines.len());
        for line in lines {
            if line.text.trim().is_empty() {
                continue;
            }
            if self.revisions.is_revision_line(&line.text) {
                counts.revision_lines_dropped += 1;
                continue;
            }
            if self.headings.is_toc_line(&line.text) {
                counts.toc_lines_dropped += 1;
                continue;
            }
            kept.push(line);
        }

        let (merged, merges) = normalize::merge_hyphenated_lines(kept);
        counts.dehyphenation_merges = merges;
        (merged, counts)
    }

    fn collect_candidates(&self, lines: &[ExtractedLine]) -> Vec<DraftSection> {
        #[derive(Debug)]
        struct ActiveSection {
            number: SectionNumber,
            title: String,
            page: u32,
            body_lines: Vec<String>,
        }

        fn finalize(active: ActiveSection) -> DraftSection {
            DraftSection {
                number: active.number,
                title: active.title,
                body: active.body_lines.join("\n").trim().to_string(),
                page: active.page,
            }
        }

        let mut drafts = Vec::new();
        let mut current: Option<ActiveSection> = None;
        let mut index = 0usize;

        while index < lines.len() {
            let line = &lines[index];
            let text = condense_whitespace(&line.text);
            index += 1;

            if let Some(candidate) = self.headings.detect(&text) {
                let mut title = candidate.title;
                if title.is_empty() {
                    let next_title = lines
                        .get(index)
                        .filter(|next| self.headings.is_title_line(&next.text));
                    if let Some(next) = next_title {
                        title = condense_whitespace(&next.text);
                        index += 1;
                    }
                }

                if let Some(active) = current.take() {
                    drafts.push(finalize(active));
                }
                current = Some(ActiveSection {
                    number: candidate.number,
                    title,
                    page: line.page,
                    body_lines: Vec::new(),
                });
                continue;
            }

            if let Some(active) = current.as_mut() {
                active.body_lines.push(text);
            }
        }

        if let Some(active) = current.take() {
            drafts.push(finalize(active));
        }

        drafts
    }

    fn fallback_draft(&self, lines: &[ExtractedLine]) -> Option<DraftSection> {
        let first = lines.first()?;
        let body = lines
            .iter()
            .map(|line| condense_whitespace(&line.text))
            .collect::<Vec<String>>()
            .join("\n");
        Some(DraftSection {
            number: SectionNumber::from_components(vec![FALLBACK_SECTION_NUMBER])?,
            title: FALLBACK_SECTION_TITLE.to_string(),
            body,
            page: first.page,
        })
    }

    fn link_sections(&self, drafts: Vec<DraftSection>) -> Vec<ManualSection> {
        let mut seen = BTreeSet::<SectionNumber>::new();
        drafts
            .into_iter()
            .map(|draft| {
                let parent_number = draft.number.parent().filter(|parent| seen.contains(parent));
                seen.insert(draft.number.clone());
                ManualSection {
                    citations: self.citations.extract(&draft.body),
                    section_number: draft.number,
                    parent_number,
                    title: draft.title,
                    body_text: draft.body,
                    page_number: draft.page,
                }
            })
            .collect()
    }

    fn detect_version_label(&self, lines: &[ExtractedLine]) -> Option<String> {
        lines.iter().find_map(|line| {
            self.version_label
                .captures(&line.text)
                .and_then(|captures| captures.get(1))
                .map(|label| label.as_str().trim_end_matches(['.', '-']).to_string())
        })
    }
}

/// Collapses heading candidates that have no body between them: a repeated
/// number merges into the later candidate, a title-less candidate is dropped.
fn merge_adjacent_headings(candidates: Vec<DraftSection>) -> (Vec<DraftSection>, usize) {
    let mut merged = Vec::<DraftSection>::with_capacity(candidates.len());
    let mut merge_count = 0usize;

    for mut candidate in candidates {
        if let Some(previous) = merged.last() {
            let adjacent = previous.body.is_empty();
            let same_number = previous.number == candidate.number;
            if adjacent && (same_number || previous.title.is_empty()) {
                if let Some(previous) = merged.pop() {
                    if same_number && !previous.title.is_empty() {
                        candidate.title = if candidate.title.is_empty() {
                            previous.title
                        } else {
                            format!("{} {}", previous.title, candidate.title)
                        };
                    }
                }
                merge_count += 1;
            }
        }
        merged.push(candidate);
    }

    (merged, merge_count)
}

/// Later occurrences of a number feed their body into the first occurrence.
fn fold_duplicate_numbers(drafts: Vec<DraftSection>) -> (Vec<DraftSection>, usize) {
    let mut first_index = BTreeMap::<SectionNumber, usize>::new();
    let mut unique = Vec::<DraftSection>::with_capacity(drafts.len());
    let mut duplicates = 0usize;

    for draft in drafts {
        let Some(&index) = first_index.get(&draft.number) else {
            first_index.insert(draft.number.clone(), unique.len());
            unique.push(draft);
            continue;
        };

        duplicates += 1;
        let existing = &mut unique[index];
        if existing.body.is_empty() {
            existing.page = draft.page;
            if !draft.title.is_empty() {
                existing.title = draft.title;
            }
            existing.body = draft.body;
        } else if !draft.body.is_empty() {
            existing.body = format!("{}\n{}", existing.body, draft.body);
        }
    }

    (unique, duplicates)
}
