use anyhow::{Context, Result};
use regex::Regex;

/// Canonical form used for citation equality: `"<title> CFR <part>.<section>"`.
/// Paragraph designators such as `(a)(1)` are dropped so a paragraph-level
/// reference matches the section it belongs to.
pub fn normalize_citation(raw: &str) -> Option<String> {
    let condensed = raw
        .replace('§', " ")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ");
    if condensed.is_empty() {
        return None;
    }

    let upper = condensed.to_ascii_uppercase();
    let Some(cfr_at) = upper.find("CFR") else {
        return Some(upper);
    };

    let title = upper[..cfr_at].trim();
    let title = title
        .rsplit(' ')
        .next()
        .filter(|value| !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit()))?;

    let rest = upper[cfr_at + 3..].trim_start();
    let rest = rest
        .strip_prefix("PART")
        .map(str::trim_start)
        .unwrap_or(rest);
    let section = rest
        .split(|ch: char| ch.is_whitespace() || ch == '(' || ch == ',' || ch == ';')
        .next()
        .unwrap_or("")
        .trim_end_matches('.');
    if section.is_empty() || !section.starts_with(|ch: char| ch.is_ascii_digit()) {
        return None;
    }

    Some(format!("{title} CFR {}", section.to_ascii_lowercase()))
}

#[derive(Debug)]
pub struct CitationExtractor {
    cfr_pattern: Regex,
}

impl CitationExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            cfr_pattern: Regex::new(
                r"(?i)\b\d+\s*CFR\s*(?:Part\s*)?§?\s*\d+\.\d+[a-z0-9.()]*",
            )
            .context("failed to compile CFR citation regex")?,
        })
    }

    /// Sorted, de-duplicated canonical citations found in `text`.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut citations = self
            .cfr_pattern
            .find_iter(text)
            .filter_map(|found| normalize_citation(found.as_str()))
            .collect::<Vec<String>>();
        citations.sort();
        citations.dedup();
        citations
    }
}
