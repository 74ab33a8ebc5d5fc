use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::SectionNumber;

use super::headings::bounded_parse;

const MAX_INLINE_TITLE_WORDS: usize = 12;

/// A section under assembly. `body` is the text that follows the heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSection {
    pub number: SectionNumber,
    pub title: String,
    pub body: String,
    pub page: u32,
}

/// Finds subsection numbers written inline in a section body, e.g. a `6.4.1`
/// that never made it onto a line of its own.
#[derive(Debug)]
pub struct InlineSubsectionSplitter {
    number_token: Regex,
}

impl InlineSubsectionSplitter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            number_token: Regex::new(r"\d+(?:\.\d+)+")
                .context("failed to compile inline section number regex")?,
        })
    }

    /// Splits every draft on inline direct-child numbers that are not already
    /// known, recursing into recovered children. Returns the new draft list
    /// in document order and the count of recovered sections.
    pub fn recover(&self, drafts: Vec<DraftSection>) -> (Vec<DraftSection>, usize) {
        let mut known = drafts
            .iter()
            .map(|draft| draft.number.clone())
            .collect::<BTreeSet<SectionNumber>>();
        let mut output = Vec::with_capacity(drafts.len());
        let mut recovered = 0usize;

        for draft in drafts {
            recovered += self.split_into(draft, &mut known, &mut output);
        }

        (output, recovered)
    }

    fn split_into(
        &self,
        draft: DraftSection,
        known: &mut BTreeSet<SectionNumber>,
        output: &mut Vec<DraftSection>,
    ) -> usize {
        let splits = self.find_splits(&draft, known);
        if splits.is_empty() {
            output.push(draft);
            return 0;
        }

        let mut children = Vec::with_capacity(splits.len());
        for (index, split) in splits.iter().enumerate() {
            let end = splits
                .get(index + 1)
                .map(|next| next.start)
                .unwrap_or(draft.body.len());
            let remainder = &draft.body[split.after_number..end];
            let (title, body) = split_title(remainder);
            known.insert(split.number.clone());
            children.push(DraftSection {
                number: split.number.clone(),
                title,
                body,
                page: draft.page,
            });
        }

        let mut recovered = children.len();
        let parent_body = draft.body[..splits[0].start].trim().to_string();
        output.push(DraftSection {
            body: parent_body,
            ..draft
        });
        for child in children {
            recovered += self.split_into(child, known, output);
        }
        recovered
    }

    fn find_splits(&self, draft: &DraftSection, known: &BTreeSet<SectionNumber>) -> Vec<Split> {
        let mut splits = Vec::<Split>::new();
        for found in self.number_token.find_iter(&draft.body) {
            let preceded_by_dot = draft.body[..found.start()].ends_with('.');
            if preceded_by_dot {
                continue;
            }
            let Some(number) = bounded_parse(found.as_str()) else {
                continue;
            };
            if !number.is_direct_child_of(&draft.number) || known.contains(&number) {
                continue;
            }
            if splits.last().is_some_and(|last| number <= last.number) {
                continue;
            }
            splits.push(Split {
                number,
                start: found.start(),
                after_number: found.end(),
            });
        }
        splits
    }
}

#[derive(Debug)]
struct Split {
    number: SectionNumber,
    start: usize,
    after_number: usize,
}

/// Leading capitalized words become the title; the rest is body text.
fn split_title(remainder: &str) -> (String, String) {
    let is_separator = |ch: char| ch.is_whitespace() || matches!(ch, '-' | ':' | '–' | '—');
    let text = remainder.trim_start_matches(is_separator);

    let mut title_words = Vec::<&str>::new();
    let mut consumed = 0usize;
    for word in text.split_whitespace() {
        let starts_uppercase = word
            .chars()
            .next()
            .map(char::is_uppercase)
            .unwrap_or(false);
        if !starts_uppercase || title_words.len() >= MAX_INLINE_TITLE_WORDS {
            break;
        }

        let bare = word.trim_end_matches([',', '.', ';', ':']);
        let Some(offset) = text[consumed..].find(word) else {
            break;
        };
        consumed += offset + word.len();
        if !bare.is_empty() {
            title_words.push(bare);
        }
        if bare.len() != word.len() {
            break;
        }
    }

    let title = title_words.join(" ");
    let body = text[consumed..]
        .trim_start_matches([',', '.', ';', ':'])
        .trim()
        .to_string();
    (title, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(raw: &str) -> SectionNumber {
        SectionNumber::parse(raw).expect("valid number")
    }

    fn draft(raw: &str, title: &str, body: &str) -> DraftSection {
        DraftSection {
            number: number(raw),
            title: title.to_string(),
            body: body.to_string(),
            page: 7,
        }
    }

    #[test]
    fn splits_inline_direct_children_with_capitalized_titles() {
        let splitter = InlineSubsectionSplitter::new().expect("splitter");
        let drafts = vec![draft(
            "6.4",
            "Airworthiness Directives",
            "The operator tracks ADs; see 6.4.1 AD Process Measurement for details, and 6.4.2 covers recurring inspections.",
        )];

        let (output, recovered) = splitter.recover(drafts);
        assert_eq!(recovered, 2);
        assert_eq!(output.len(), 3);
        assert_eq!(output[0].body, "The operator tracks ADs; see");
        assert_eq!(output[1].number, number("6.4.1"));
        assert_eq!(output[1].title, "AD Process Measurement");
        assert_eq!(output[1].body, "for details, and");
        assert_eq!(output[1].page, 7);
        assert_eq!(output[2].number, number("6.4.2"));
        assert_eq!(output[2].title, "");
        assert_eq!(output[2].body, "covers recurring inspections.");
    }

    #[test]
    fn ignores_known_numbers_non_children_and_decreasing_numbers() {
        let splitter = InlineSubsectionSplitter::new().expect("splitter");
        let drafts = vec![
            draft(
                "6.4",
                "Airworthiness Directives",
                "Refer to 14 CFR 121.369 and 6.4.3 first, then 6.4.2 and 6.4.1.5 and 6.5.1.",
            ),
            draft("6.4.1", "Known", "Existing body."),
        ];

        let (output, recovered) = splitter.recover(drafts);
        assert_eq!(recovered, 1);
        let numbers = output
            .iter()
            .map(|draft| draft.number.to_string())
            .collect::<Vec<String>>();
        assert_eq!(numbers, vec!["6.4", "6.4.3", "6.4.1"]);
        assert!(output[1].body.contains("6.4.2"));
    }

    #[test]
    fn recovered_children_are_scanned_for_their_own_children() {
        let splitter = InlineSubsectionSplitter::new().expect("splitter");
        let drafts = vec![draft(
            "6.4",
            "Airworthiness Directives",
            "Intro 6.4.1 Tracking then 6.4.1.1 Recurring ADs are logged.",
        )];

        let (output, recovered) = splitter.recover(drafts);
        assert_eq!(recovered, 2);
        assert_eq!(output[2].number, number("6.4.1.1"));
        assert_eq!(output[2].title, "Recurring ADs");
        assert_eq!(output[2].body, "are logged.");
    }

    #[test]
    fn dates_shaped_like_child_numbers_are_not_split() {
        let splitter = InlineSubsectionSplitter::new().expect("splitter");
        let body = "The revision took effect on 1.2.2024 Until Further Notice for all stations.";
        let drafts = vec![draft("1.2", "Effective Dates", body)];

        let (output, recovered) = splitter.recover(drafts);
        assert_eq!(recovered, 0);
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].body, body);
    }

    #[test]
    fn split_title_stops_at_punctuation() {
        assert_eq!(
            split_title(" - Records Retention. Keep all records."),
            ("Records Retention".to_string(), "Keep all records.".to_string())
        );
    }
}
