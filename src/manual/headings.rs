use anyhow::{Context, Result};
use regex::Regex;

use crate::model::SectionNumber;

const MAX_COMPONENT_VALUE: u32 = 999;
const MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingCandidate {
    pub number: SectionNumber,
    pub title: String,
}

#[derive(Debug)]
pub struct HeadingMatcher {
    chapter_heading: Regex,
    section_heading: Regex,
    numbered_heading: Regex,
    bare_number: Regex,
    toc_line: Regex,
    max_title_chars: usize,
}

impl HeadingMatcher {
    pub fn new(max_title_chars: usize) -> Result<Self> {
        Ok(Self {
            chapter_heading: Regex::new(r"^\s*(?i:chapter)\s+(\d+|[IVXLCDM]+)\b\.?\s*[-:–—]?\s*(.*)$")
                .context("failed to compile chapter heading regex")?,
            section_heading: Regex::new(r"^\s*(?i:section)\s+(\d+(?:\.\d+)*)\.?(?:\s*[-:–—]\s*|\s+|$)(.*)$")
                .context("failed to compile section heading regex")?,
            numbered_heading: Regex::new(r"^\s*(\d+(?:\.\d+)+)\.?(?:\s*[-:–—]\s*|\s+)(.+)$")
                .context("failed to compile numbered heading regex")?,
            bare_number: Regex::new(r"^\s*(\d+(?:\.\d+)+)\.?\s*$")
                .context("failed to compile bare section number regex")?,
            toc_line: Regex::new(r"(?:\.\s*){3,}\d+\s*$")
                .context("failed to compile table-of-contents line regex")?,
            max_title_chars,
        })
    }

    pub fn is_toc_line(&self, line: &str) -> bool {
        self.toc_line.is_match(line)
    }

    /// Recognizes a heading line. Bare numbers and keyword headings without a
    /// title come back with an empty title; the caller may borrow the title
    /// from the following line.
    pub fn detect(&self, line: &str) -> Option<HeadingCandidate> {
        if self.is_toc_line(line) {
            return None;
        }

        if let Some(captures) = self.chapter_heading.captures(line) {
            let raw = captures.get(1)?.as_str();
            let value = raw
                .parse::<u32>()
                .ok()
                .or_else(|| roman_to_u32(raw))?;
            let number = bounded_number(vec![value])?;
            let title = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            return self.accept_keyword_title(number, title);
        }

        if let Some(captures) = self.section_heading.captures(line) {
            let number = bounded_parse(captures.get(1)?.as_str())?;
            let title = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            return self.accept_keyword_title(number, title);
        }

        if let Some(captures) = self.bare_number.captures(line) {
            let number = bounded_parse(captures.get(1)?.as_str())?;
            return Some(HeadingCandidate {
                number,
                title: String::new(),
            });
        }

        if let Some(captures) = self.numbered_heading.captures(line) {
            let number = bounded_parse(captures.get(1)?.as_str())?;
            let title = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            if !self.is_title_like(title) {
                return None;
            }
            return Some(HeadingCandidate {
                number,
                title: title.to_string(),
            });
        }

        None
    }

    /// A line that may serve as the title of a bare heading on the line above.
    pub fn is_title_line(&self, line: &str) -> bool {
        let trimmed = line.trim();
        self.is_title_like(trimmed)
            && !trimmed.ends_with(['.', ',', ';'])
            && self.detect(trimmed).is_none()
    }

    fn accept_keyword_title(&self, number: SectionNumber, title: &str) -> Option<HeadingCandidate> {
        if !title.is_empty() && !self.is_title_like(title) {
            return None;
        }
        Some(HeadingCandidate {
            number,
            title: title.to_string(),
        })
    }

    fn is_title_like(&self, title: &str) -> bool {
        let starts_uppercase = title
            .chars()
            .next()
            .map(char::is_uppercase)
            .unwrap_or(false);
        starts_uppercase && title.chars().count() <= self.max_title_chars
    }
}

/// Parses a section number, rejecting dates and part numbers that only look
/// like one (too deep or a component above 999).
pub(super) fn bounded_parse(raw: &str) -> Option<SectionNumber> {
    let number = SectionNumber::parse(raw)?;
    bounded_number(number.components().to_vec())
}

fn bounded_number(components: Vec<u32>) -> Option<SectionNumber> {
    if components.len() > MAX_DEPTH
        || components.iter().any(|value| *value > MAX_COMPONENT_VALUE)
    {
        return None;
    }
    SectionNumber::from_components(components)
}

pub fn roman_to_u32(raw: &str) -> Option<u32> {
    let mut total = 0u32;
    let mut previous = 0u32;
    for character in raw.chars().rev() {
        let value = match character {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            'D' => 500,
            'M' => 1000,
            _ => return None,
        };
        if value < previous {
            total = total.checked_sub(value)?;
        } else {
            total += value;
            previous = value;
        }
    }
    (total > 0).then_some(total)
}
