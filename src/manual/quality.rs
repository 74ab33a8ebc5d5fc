use serde::{Deserialize, Serialize};

use crate::model::{ManualSection, ParseMetrics, ParseQualityReport, QualityVerdict};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityThresholds {
    pub warn_chars_per_page: f64,
    pub fail_chars_per_page: f64,
    pub min_sections: usize,
    pub min_average_body_chars: f64,
    pub max_orphan_ratio: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            warn_chars_per_page: 200.0,
            fail_chars_per_page: 20.0,
            min_sections: 3,
            min_average_body_chars: 40.0,
            max_orphan_ratio: 0.5,
        }
    }
}

pub fn failed_report(reason: impl Into<String>, metrics: ParseMetrics) -> ParseQualityReport {
    let reason = reason.into();
    ParseQualityReport {
        verdict: QualityVerdict::Fail,
        issues: vec![format!("extraction failure: {reason}")],
        extraction_failure: Some(reason),
        metrics,
    }
}

/// Fills the section-derived metrics and grades the parse.
pub fn assess(
    sections: &[ManualSection],
    mut metrics: ParseMetrics,
    thresholds: &QualityThresholds,
) -> ParseQualityReport {
    if metrics.non_whitespace_chars == 0 {
        return failed_report("extraction produced no text", metrics);
    }

    metrics.section_count = sections.len();
    metrics.chars_per_page = if metrics.page_count == 0 {
        0.0
    } else {
        metrics.non_whitespace_chars as f64 / metrics.page_count as f64
    };
    metrics.average_body_chars = if sections.is_empty() {
        0.0
    } else {
        let total = sections
            .iter()
            .map(|section| section.body_text.chars().count())
            .sum::<usize>();
        total as f64 / sections.len() as f64
    };
    let nested = sections
        .iter()
        .filter(|section| section.section_number.depth() > 1)
        .count();
    metrics.orphan_section_count = sections
        .iter()
        .filter(|section| section.section_number.depth() > 1 && section.parent_number.is_none())
        .count();

    let mut verdict = QualityVerdict::Ok;
    let mut issues = Vec::new();
    let mut flag = |level: QualityVerdict, issue: String| {
        verdict = verdict.max(level);
        issues.push(issue);
    };

    if metrics.chars_per_page < thresholds.fail_chars_per_page {
        flag(
            QualityVerdict::Fail,
            format!(
                "text density {:.1} chars/page is below {}",
                metrics.chars_per_page, thresholds.fail_chars_per_page
            ),
        );
    } else if metrics.chars_per_page < thresholds.warn_chars_per_page {
        flag(
            QualityVerdict::Warning,
            format!(
                "text density {:.1} chars/page is below {}",
                metrics.chars_per_page, thresholds.warn_chars_per_page
            ),
        );
    }

    if metrics.fallback_section_used {
        flag(
            QualityVerdict::Warning,
            "no section headings detected; whole text kept as one section".to_string(),
        );
    } else if metrics.section_count < thresholds.min_sections {
        flag(
            QualityVerdict::Warning,
            format!(
                "only {} sections detected (expected at least {})",
                metrics.section_count, thresholds.min_sections
            ),
        );
    }

    if metrics.average_body_chars < thresholds.min_average_body_chars {
        flag(
            QualityVerdict::Warning,
            format!(
                "average section body is {:.1} chars (expected at least {})",
                metrics.average_body_chars, thresholds.min_average_body_chars
            ),
        );
    }

    if nested > 0 {
        let ratio = metrics.orphan_section_count as f64 / nested as f64;
        if ratio > thresholds.max_orphan_ratio {
            flag(
                QualityVerdict::Warning,
                format!(
                    "{} of {} nested sections have no parent heading",
                    metrics.orphan_section_count, nested
                ),
            );
        }
    }

    ParseQualityReport {
        verdict,
        extraction_failure: None,
        issues,
        metrics,
    }
}
