use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::citation::normalize_citation;
use crate::error::QuestionError;

/// Dotted numeric section path. Ordering is component-wise numeric, so
/// `6.4.2 < 6.4.12` and a parent sorts before its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectionNumber(Vec<u32>);

impl SectionNumber {
    pub fn from_components(components: Vec<u32>) -> Option<Self> {
        if components.is_empty() {
            return None;
        }
        Some(Self(components))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_end_matches('.');
        if trimmed.is_empty() {
            return None;
        }

        let mut components = Vec::new();
        for part in trimmed.split('.') {
            if part.is_empty() || !part.chars().all(|ch| ch.is_ascii_digit()) {
                return None;
            }
            components.push(part.parse::<u32>().ok()?);
        }

        Self::from_components(components)
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn parent(&self) -> Option<SectionNumber> {
        if self.0.len() < 2 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Strict prefix test: `6.4` is an ancestor of `6.4.1` and `6.4.1.2`.
    pub fn is_ancestor_of(&self, other: &SectionNumber) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    pub fn is_direct_child_of(&self, parent: &SectionNumber) -> bool {
        self.0.len() == parent.0.len() + 1 && self.0.starts_with(&parent.0)
    }
}

impl fmt::Display for SectionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(u32::to_string)
            .collect::<Vec<String>>()
            .join(".");
        f.write_str(&rendered)
    }
}

impl FromStr for SectionNumber {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| format!("invalid dotted section number: {value}"))
    }
}

impl TryFrom<String> for SectionNumber {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SectionNumber> for String {
    fn from(value: SectionNumber) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ManualType {
    #[serde(rename = "AIP")]
    Aip,
    #[serde(rename = "GMM")]
    Gmm,
    #[serde(rename = "Other")]
    Other,
}

impl ManualType {
    /// Unrecognized labels fall into `Other`, which is evaluated on its own.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "AIP" => Self::Aip,
            "GMM" => Self::Gmm,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aip => "AIP",
            Self::Gmm => "GMM",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ManualType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualSection {
    pub section_number: SectionNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_number: Option<SectionNumber>,
    pub title: String,
    pub body_text: String,
    pub page_number: u32,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityVerdict {
    Ok,
    Warning,
    Fail,
}

impl QualityVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseMetrics {
    pub page_count: usize,
    pub line_count: usize,
    pub non_whitespace_chars: usize,
    pub chars_per_page: f64,
    pub section_count: usize,
    pub average_body_chars: f64,
    pub orphan_section_count: usize,
    pub header_footer_lines_removed: usize,
    pub revision_lines_dropped: usize,
    pub toc_lines_dropped: usize,
    pub dehyphenation_merges: usize,
    pub merged_heading_count: usize,
    pub duplicate_heading_count: usize,
    pub inline_subsections_recovered: usize,
    pub fallback_section_used: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseQualityReport {
    pub verdict: QualityVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_failure: Option<String>,
    pub issues: Vec<String>,
    pub metrics: ParseMetrics,
}

/// A parsed manual. Built once per parse and shared behind `Arc` afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualCorpus {
    pub manual_id: String,
    pub manual_type: ManualType,
    pub filename: String,
    pub source_path: String,
    pub source_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_label: Option<String>,
    pub generation: u64,
    pub uploaded_at: String,
    pub parsed_at: String,
    pub sections: Vec<ManualSection>,
    pub report: ParseQualityReport,
}

impl ManualCorpus {
    pub fn verdict(&self) -> QualityVerdict {
        self.report.verdict
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord")]
pub struct Question {
    pub qid: String,
    pub text: String,
    pub citations: Vec<String>,
    pub topic_hints: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QuestionRecord {
    qid: String,
    #[serde(default, alias = "question_text")]
    text: String,
    #[serde(default, alias = "reference_cfr_list")]
    citations: Vec<String>,
    #[serde(default)]
    topic_hints: Vec<String>,
}

impl TryFrom<QuestionRecord> for Question {
    type Error = QuestionError;

    fn try_from(record: QuestionRecord) -> Result<Self, Self::Error> {
        Question::new(record.qid, record.text, record.citations, record.topic_hints)
    }
}

impl Question {
    pub fn new(
        qid: impl Into<String>,
        text: impl Into<String>,
        citations: Vec<String>,
        topic_hints: Vec<String>,
    ) -> Result<Self, QuestionError> {
        let qid = qid.into().trim().to_string();
        if qid.is_empty() {
            return Err(QuestionError::MissingQid);
        }

        let mut citations = citations
            .iter()
            .filter_map(|raw| normalize_citation(raw))
            .collect::<Vec<String>>();
        citations.sort();
        citations.dedup();

        let topic_hints = topic_hints
            .into_iter()
            .map(|hint| hint.trim().to_string())
            .filter(|hint| !hint.is_empty())
            .collect();

        Ok(Self {
            qid,
            text: text.into(),
            citations,
            topic_hints,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub command: String,
    pub manual_id: String,
    pub manual_type: ManualType,
    pub source_path: String,
    pub source_sha256: String,
    pub extractor: String,
    pub config_version: String,
    pub config_fingerprint: String,
    pub started_at: String,
    pub completed_at: String,
    pub publish_outcome: String,
    pub generation: u64,
    pub version_label: Option<String>,
    pub report: ParseQualityReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(raw: &str) -> SectionNumber {
        SectionNumber::parse(raw).expect("valid section number")
    }

    #[test]
    fn section_numbers_order_numerically_not_lexically() {
        assert!(number("6.4.2") < number("6.4.12"));
        assert!(number("6.4.1") < number("6.4.2"));
        assert!(number("6.4") < number("6.4.1"));
        assert!(number("9.9") < number("10.1"));

        let mut numbers = vec![number("6.4.12"), number("6.4.2"), number("6.4.1")];
        numbers.sort();
        let rendered = numbers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<String>>();
        assert_eq!(rendered, vec!["6.4.1", "6.4.2", "6.4.12"]);
    }

    #[test]
    fn section_number_hierarchy_uses_prefix_components() {
        assert!(number("6.4").is_ancestor_of(&number("6.4.1")));
        assert!(number("6.4").is_ancestor_of(&number("6.4.1.3")));
        assert!(!number("6.4").is_ancestor_of(&number("6.41")));
        assert!(!number("6.4").is_ancestor_of(&number("6.4")));
        assert!(number("6.4.1").is_direct_child_of(&number("6.4")));
        assert!(!number("6.4.1.3").is_direct_child_of(&number("6.4")));
        assert_eq!(number("6.4.1").parent(), Some(number("6.4")));
        assert_eq!(number("6").parent(), None);
    }

    #[test]
    fn section_number_rejects_non_numeric_paths() {
        assert!(SectionNumber::parse("6.a").is_none());
        assert!(SectionNumber::parse("").is_none());
        assert!(SectionNumber::parse("6..4").is_none());
        assert_eq!(number("6.4.").to_string(), "6.4");
    }

    #[test]
    fn section_number_serializes_as_dotted_string() {
        let json = serde_json::to_string(&number("6.4.12")).expect("serialize");
        assert_eq!(json, "\"6.4.12\"");
        let parsed: SectionNumber = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, number("6.4.12"));
        assert!(serde_json::from_str::<SectionNumber>("\"six\"").is_err());
    }

    #[test]
    fn manual_type_maps_unknown_labels_to_other() {
        assert_eq!(ManualType::from_label("aip"), ManualType::Aip);
        assert_eq!(ManualType::from_label(" GMM "), ManualType::Gmm);
        assert_eq!(ManualType::from_label("RSM"), ManualType::Other);
    }

    #[test]
    fn question_record_requires_qid_and_normalizes_citations() {
        let raw = r#"{
            "qid": "00004724",
            "question_text": "Does the operator track recurring ADs?",
            "reference_cfr_list": ["14 cfr 121.369(a)", "14 CFR  121.369"]
        }"#;

        let question: Question = serde_json::from_str(raw).expect("question should deserialize");
        assert_eq!(question.qid, "00004724");
        assert_eq!(question.citations, vec!["14 CFR 121.369"]);
        assert!(question.topic_hints.is_empty());

        let missing = r#"{ "qid": "  ", "text": "anything" }"#;
        assert!(serde_json::from_str::<Question>(missing).is_err());
    }
}
